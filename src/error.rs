use std::io;
use thiserror::Error;

/// Error type for pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Io(#[from] io::Error),

    /// The task panicked while running.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// The task was discarded before it could run.
    #[error("task cancelled before execution")]
    Cancelled,
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
