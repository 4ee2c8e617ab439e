//! Error types for Macroscope

use thiserror::Error;

/// Macroscope error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Expansion error: {0}")]
    Expansion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Macroscope
pub type Result<T> = std::result::Result<T, Error>;
