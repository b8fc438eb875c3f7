//! Common error types for padmix

use thiserror::Error;

/// Common result type for padmix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across padmix crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
