//! Kernel error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("application is not running: {0}")]
    NotRunning(String),

    #[error("no answer for {0}")]
    NoAnswer(String),

    #[error("config store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure of a blocking fetch. Always a soft failure for callers.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("{0}")]
    Other(String),
}

/// Why a background task or command handler did not complete.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0:#}")]
    Failed(anyhow::Error),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Short kind label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Failed(_) => "failed",
            TaskError::Panicked(_) => "panicked",
        }
    }
}
