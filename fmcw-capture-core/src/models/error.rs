use thiserror::Error;

/// Errors that can occur while staging a capture to storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("acquisition source failed: {0}")]
    SourceFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("sink write failed: {0}")]
    SinkWrite(String),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("thread error: {0}")]
    Thread(String),
}
