//! Compile-time error categories.
//!
//! Mirrors the teacher's hand-rolled error enum idiom (`LowerErr`, `ServerError`)
//! rather than reaching for `thiserror`/`anyhow`.

use std::fmt;

/// Every failure this crate can produce, from lexing through IR generation.
#[derive(Debug, Clone)]
pub enum CompileError {
    /// Lexer/parser failure: malformed token or grammar violation.
    Syntax { message: String },
    /// A well-formed program rejected by semantic analysis or lowering.
    Semantic { message: String },
    /// An invariant the pipeline itself is supposed to guarantee was violated.
    Internal { message: String },
}

impl CompileError {
    pub fn syntax(message: impl Into<String>) -> Self {
        CompileError::Syntax { message: message.into() }
    }
    pub fn semantic(message: impl Into<String>) -> Self {
        CompileError::Semantic { message: message.into() }
    }
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal { message: message.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax { message } => write!(f, "syntax error: {message}"),
            CompileError::Semantic { message } => write!(f, "error: {message}"),
            CompileError::Internal { message } => write!(f, "internal compiler error: {message}"),
        }
    }
}

impl std::error::Error for CompileError {}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Raises an `Internal` error with a formatted message; used where pass 4's own
/// invariants guarantee a side-table lookup succeeds, so failure here signals a
/// compiler bug rather than a rejected program.
macro_rules! bug {
    ($($arg:tt)*) => {
        return Err($crate::error::CompileError::internal(format!($($arg)*)))
    };
}
pub(crate) use bug;
