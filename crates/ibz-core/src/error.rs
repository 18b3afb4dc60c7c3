use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IbzError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("source file does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("invalid destination file name: {}", .0.display())]
    InvalidDestinationName(PathBuf),
    #[error("incompatible format: {0}")]
    FormatIncompatible(&'static str),
    #[error("corrupt record header: {0}")]
    CorruptRecord(&'static str),
    #[error("truncated record at container offset {offset}")]
    TruncatedRecord { offset: u64 },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("queue was cancelled")]
    Cancelled,
    #[error("compression error: {0}")]
    CompressionError(String),
    #[error("decompression error: {0}")]
    DecompressionError(String),
    #[error("stage worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<IbzError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IbzError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Maps this error onto the coarse taxonomy exposed in run reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceNotFound(_) => ErrorKind::SourceNotFound,
            Self::InvalidDestinationName(_) => ErrorKind::InvalidDestinationName,
            Self::FormatIncompatible(_) => ErrorKind::FormatIncompatible,
            Self::Context { source, .. } => source.kind(),
            _ => ErrorKind::InternalError,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Context { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Failure classes surfaced to callers of the public entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InternalError,
    SourceNotFound,
    InvalidDestinationName,
    FormatIncompatible,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::InternalError => 1,
            Self::SourceNotFound => 2,
            Self::InvalidDestinationName => 3,
            Self::FormatIncompatible => 4,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::InternalError => "Internal error. File may be corrupted",
            Self::SourceNotFound => "File does not exist",
            Self::InvalidDestinationName => "Invalid file name",
            Self::FormatIncompatible => "File is not compatible",
        }
    }
}
