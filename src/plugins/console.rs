//! Console output plugin: the script-facing logging surface.

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use crate::plugins::{Plugin, PluginExports, RuntimeBridge};
use std::io::Write;

pub struct ConsolePlugin;

fn join_args(args: &[Value], sep: &str) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn ansi_color_code(name: &str) -> &'static str {
    match name.to_ascii_lowercase().as_str() {
        "red" => "31",
        "green" => "32",
        "yellow" => "33",
        "blue" => "34",
        "magenta" => "35",
        "cyan" => "36",
        _ => "37",
    }
}

impl Plugin for ConsolePlugin {
    fn name(&self) -> &str {
        "console"
    }

    fn init(&self, _bridge: &RuntimeBridge) -> Result<PluginExports, RuntimeError> {
        Ok(PluginExports::new()
            .function("log", |call| {
                let sep = call
                    .keyword("sep")
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| " ".to_string());
                println!("{}", join_args(&call.args, &sep));
                Ok(Value::Null)
            })
            .function("print_line", |call| {
                println!("{}", join_args(&call.args, " "));
                Ok(Value::Null)
            })
            .function("print_text", |call| {
                print!("{}", join_args(&call.args, " "));
                let _ = std::io::stdout().flush();
                Ok(Value::Null)
            })
            .function("color_log", |call| {
                let text = call.required(0, "color_log")?.to_string();
                let color = match call.args.get(1) {
                    Some(v) => v.to_string(),
                    None => call
                        .keyword("color")
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "white".to_string()),
                };
                println!("\x1b[{}m{}\x1b[0m", ansi_color_code(&color), text);
                Ok(Value::Null)
            }))
    }
}
