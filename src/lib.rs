pub mod artifact;
pub mod ast;
pub mod config;
pub mod interpreter;
pub mod modules;
pub mod parser;
pub mod plugins;
pub mod runtime;
pub mod tasks;
pub mod tokenizer;

pub use interpreter::Interpreter;
pub use interpreter::errors::{ErrorCode, RuntimeError, ScriptError};
pub use interpreter::value::Value;
pub use runtime::{AmlRuntime, RuntimeOptions};
