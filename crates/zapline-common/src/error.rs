//! Error types for Zapline

use thiserror::Error;

/// Main error type for Zapline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Zapline
pub type Result<T> = std::result::Result<T, Error>;
