//! Error types for offline processing

use thiserror::Error;

use crate::job::TaskId;

/// Offline processing errors
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Worker pool could not start unit {unit}: {reason}")]
    PoolInit { unit: usize, reason: String },

    #[error("Worker unit failed on task {task}: {reason}")]
    UnitRuntime { task: TaskId, reason: String },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Invalid audio buffer: {0}")]
    InvalidBuffer(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure kind without payload, for branching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    Render,
    PoolInit,
    UnitRuntime,
    Encode,
    InvalidBuffer,
    Config,
    Io,
}

impl OfflineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::Render(_) => ErrorKind::Render,
            Self::PoolInit { .. } => ErrorKind::PoolInit,
            Self::UnitRuntime { .. } => ErrorKind::UnitRuntime,
            Self::Encode(_) => ErrorKind::Encode,
            Self::InvalidBuffer(_) => ErrorKind::InvalidBuffer,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for offline operations
pub type OfflineResult<T> = Result<T, OfflineError>;
