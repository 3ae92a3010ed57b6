//! Error types for the ingestion pipeline
//!
//! Backpressure (`QueueFull`) is the one deliberately recoverable variant:
//! callers retry after a delay. Accounting violations are never errors; they
//! panic, because a broken workflow invariant means the process state is
//! untrustworthy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Document failed to parse
    #[error(transparent)]
    Parse(#[from] graphload_ir::IrError),

    /// The parser intake queue is full; retry after a delay
    #[error("parser intake queue is full")]
    QueueFull,

    /// The loader (or a pool/sink inside it) has been closed
    #[error("loader is closed")]
    Closed,

    /// A write sink rejected a batch
    #[error("sink '{sink}' write failed: {message}")]
    SinkWrite { sink: String, message: String },

    /// A downstream write needed an identifier that was never assigned
    #[error("no identifier assigned for term {term}")]
    IdentifierMissing { term: String },

    /// Resource could not be opened or read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource kind the loader cannot fetch
    #[error("unsupported resource '{0}'")]
    UnsupportedResource(String),
}

impl IngestError {
    pub fn sink_write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        IngestError::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// True when the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::QueueFull)
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_queue_full_is_retryable() {
        assert!(IngestError::QueueFull.is_retryable());
        assert!(!IngestError::Closed.is_retryable());
        assert!(!IngestError::sink_write("direct", "boom").is_retryable());
    }
}
