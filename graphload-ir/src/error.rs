//! Error types for parsing and the statement model

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrError {
    /// Malformed input at a known line
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A statement callback rejected the statement
    #[error("statement handler error: {0}")]
    Handler(String),

    /// Underlying reader failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IrError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        IrError::Syntax {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IrError>;
