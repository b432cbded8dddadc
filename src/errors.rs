//! Error types for Cartographer.

use crate::config::ConfigError;
use crate::output::OutputError;
use crate::walker::WalkError;

/// Top-level error type for Cartographer operations.
#[derive(Debug, thiserror::Error)]
pub enum CartographerError {
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),

    #[error("run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map an error to its exit code.
pub fn exit_code(error: &CartographerError) -> i32 {
    match error {
        CartographerError::Walk(WalkError::NotFound { .. }) => 3,
        CartographerError::Walk(WalkError::NotADirectory { .. }) => 2,
        CartographerError::Config(ConfigError::AlreadyExists(_)) => 4,
        CartographerError::Config(_) => 1,
        CartographerError::Output(_) => 1,
        CartographerError::Cancelled => 130,
        CartographerError::Io(_) => 1,
    }
}
