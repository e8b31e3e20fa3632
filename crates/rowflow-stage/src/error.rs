use std::fmt;

use rowflow_bind::BindError;
use rowflow_source::SourceError;

#[derive(Debug)]
pub enum StageError {
    /// A row could not be turned into the stage's output.
    Bind(BindError),
    Usage(String),
    /// The stage was faulted, by a failed row or an upstream failure.
    Faulted(String),
    Source(SourceError),
    /// A parallel materialization task panicked or was aborted.
    Join(String),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Bind(e) => write!(f, "{e}"),
            StageError::Usage(msg) => write!(f, "usage error: {msg}"),
            StageError::Faulted(msg) => write!(f, "stage faulted: {msg}"),
            StageError::Source(e) => write!(f, "{e}"),
            StageError::Join(msg) => write!(f, "materialization task failed: {msg}"),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StageError::Bind(e) => Some(e),
            StageError::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BindError> for StageError {
    fn from(e: BindError) -> Self {
        match e {
            BindError::Usage(msg) => StageError::Usage(msg),
            other => StageError::Bind(other),
        }
    }
}

impl From<SourceError> for StageError {
    fn from(e: SourceError) -> Self {
        StageError::Source(e)
    }
}
