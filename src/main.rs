//=====================================================
// File: main.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: AML command-line interface
// Objective: Run AML source (.aml) or compiled artifact (.caml) files and
//            compile source into artifacts
//=====================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser as ClapParser, Subcommand};

use aml::config::AmlConfig;
use aml::parser::Parser;
use aml::runtime::{ARTIFACT_EXTENSION, AmlRuntime, RuntimeOptions};
use aml::tokenizer::Tokenizer;
use aml::Value;

#[derive(Debug, ClapParser)]
#[command(
    name = "aml",
    about = "Executes AML source (.aml) or compiled artifact (.caml) files.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script or compiled artifact.
    Run {
        script: PathBuf,

        /// Pretty-print the parsed AST before execution (source files only).
        #[arg(long)]
        print_ast: bool,

        /// Yield the interpreter thread every N statements.
        #[arg(long)]
        yield_every: Option<u64>,

        /// Sleep this many milliseconds at each yield.
        #[arg(long)]
        yield_sleep_ms: Option<u64>,
    },
    /// Compile a script into a .caml artifact.
    Compile {
        input: PathBuf,

        /// Output path; defaults to the input with a .caml extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AmlConfig::load()?;

    match cli.command {
        Command::Run {
            script,
            print_ast,
            yield_every,
            yield_sleep_ms,
        } => run(&script, print_ast, &config, yield_every, yield_sleep_ms),
        Command::Compile { input, output } => compile(&input, output),
    }
}

fn run(
    script: &Path,
    print_ast: bool,
    config: &AmlConfig,
    yield_every: Option<u64>,
    yield_sleep_ms: Option<u64>,
) -> Result<()> {
    let options = RuntimeOptions {
        yield_every: yield_every.unwrap_or(config.yield_every),
        yield_sleep: Duration::from_millis(yield_sleep_ms.unwrap_or(config.yield_sleep_ms)),
    };
    let runtime = AmlRuntime::with_options(options);
    for path in &config.search_paths {
        runtime.add_search_path(path.clone());
    }
    if let Some(allowed) = &config.plugin_allowlist {
        runtime.restrict_plugins(allowed);
    }

    if print_ast && !is_artifact(script) {
        let source = fs::read_to_string(script)
            .with_context(|| format!("failed to read {}", script.display()))?;
        let tokens = Tokenizer::new(&source)
            .tokenize()
            .map_err(|err| anyhow!("tokenizer error: {err}"))?;
        let program = Parser::new(tokens)
            .parse()
            .map_err(|err| anyhow!("{}: {err}", script.display()))?;
        println!("{program:#?}");
    }

    match runtime.run_file(script) {
        Ok(Value::Null) => Ok(()),
        Ok(value) => {
            println!("{value}");
            Ok(())
        }
        Err(err) => Err(anyhow!("{err}")),
    }
}

fn compile(input: &Path, output: Option<PathBuf>) -> Result<()> {
    let runtime = AmlRuntime::new();
    let bytes = runtime
        .compile_file(input)
        .map_err(|err| anyhow!("{err}"))?;
    let output = output.unwrap_or_else(|| input.with_extension(ARTIFACT_EXTENSION));
    fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

fn is_artifact(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(ARTIFACT_EXTENSION)
}
