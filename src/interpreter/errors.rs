use crate::artifact::CodecError;
use crate::interpreter::value::Value;
use crate::modules::ImportError;
use crate::parser::ParseError;
use crate::tokenizer::LexError;
use thiserror::Error;

/// Runtime failure taxonomy. The `Return`/`Break`/`Continue` variants are
/// control-flow unwinding, never surfaced to scripts or caught by `try`.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("type error: {0}")]
    TypeError(String),
    #[error("argument error: {0}")]
    ArgumentError(String),
    #[error("index error: {0}")]
    IndexError(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("undefined name '{0}'")]
    VariableNotFound(String),
    #[error("'{0}' is not callable")]
    NotCallable(String),
    #[error("import error: {0}")]
    Import(String),
    #[error("plugin error: {0}")]
    Plugin(String),
    #[error("execution cancelled")]
    Cancelled,
    #[error("{0}")]
    Custom(String),

    #[error("internal control flow: return")]
    Return(Value),
    #[error("internal control flow: break")]
    Break,
    #[error("internal control flow: continue")]
    Continue,
}

impl RuntimeError {
    /// Whether a `try` block may catch this error. Control flow passes
    /// through, and cancellation always terminates the script.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            RuntimeError::Return(_)
                | RuntimeError::Break
                | RuntimeError::Continue
                | RuntimeError::Cancelled
        )
    }

    /// Message text bound to the `error` variable inside a catch block.
    pub fn catch_message(&self) -> String {
        self.to_string()
    }
}

impl From<ImportError> for RuntimeError {
    fn from(value: ImportError) -> Self {
        RuntimeError::Import(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Syntax,
    ModuleResolution,
    TypeMismatch,
    InvalidOperation,
    RuntimePanic,
    Artifact,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "E001",
            ErrorCode::ModuleResolution => "E002",
            ErrorCode::TypeMismatch => "E003",
            ErrorCode::InvalidOperation => "E004",
            ErrorCode::RuntimePanic => "E005",
            ErrorCode::Artifact => "E006",
        }
    }
}

/// Uniform coded diagnostic surfaced by the CLI and embedding runtime.
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub code: ErrorCode,
    pub message: String,
}

impl ScriptError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ScriptError {}

impl From<LexError> for ScriptError {
    fn from(value: LexError) -> Self {
        ScriptError::new(ErrorCode::Syntax, value.to_string())
    }
}

impl From<ParseError> for ScriptError {
    fn from(value: ParseError) -> Self {
        ScriptError::new(ErrorCode::Syntax, value.to_string())
    }
}

impl From<CodecError> for ScriptError {
    fn from(value: CodecError) -> Self {
        ScriptError::new(ErrorCode::Artifact, value.to_string())
    }
}

impl From<ImportError> for ScriptError {
    fn from(value: ImportError) -> Self {
        ScriptError::new(ErrorCode::ModuleResolution, value.to_string())
    }
}

impl From<RuntimeError> for ScriptError {
    fn from(value: RuntimeError) -> Self {
        ScriptError::new(runtime_error_code(&value), value.to_string())
    }
}

pub fn runtime_error_code(error: &RuntimeError) -> ErrorCode {
    match error {
        RuntimeError::TypeError(_) => ErrorCode::TypeMismatch,
        RuntimeError::Import(_) => ErrorCode::ModuleResolution,
        RuntimeError::ArgumentError(_)
        | RuntimeError::IndexError(_)
        | RuntimeError::DivisionByZero
        | RuntimeError::VariableNotFound(_)
        | RuntimeError::NotCallable(_) => ErrorCode::InvalidOperation,
        RuntimeError::Plugin(_)
        | RuntimeError::Cancelled
        | RuntimeError::Custom(_) => ErrorCode::RuntimePanic,
        RuntimeError::Return(_) | RuntimeError::Break | RuntimeError::Continue => {
            ErrorCode::RuntimePanic
        }
    }
}
