//! Error types for the analysis and cache layers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The three failure domains of the public API. Analysis façades surface
/// `ParseFailed` and `Unsupported`; cache façades surface `StorageFailed`.
/// Cache misses are a regular `Ok(None)`, never an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("SQL parse error: {0}")]
    ParseFailed(String),

    #[error("unsupported SQL: {0}")]
    Unsupported(String),

    #[error("storage error: {0}")]
    StorageFailed(String),
}

impl From<fjall::Error> for Error {
    fn from(e: fjall::Error) -> Self {
        Error::StorageFailed(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StorageFailed(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::StorageFailed(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::StorageFailed(e.to_string())
    }
}
