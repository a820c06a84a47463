//! Error types for beacon-core
//!
//! Pipeline operations never return these to producers: failed sends are
//! requeued or dropped internally. Errors surface only from construction,
//! config loading and logging setup.

use thiserror::Error;

/// Main error type for the beacon-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or a request never got a response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging could not be installed
    #[error("logging error: {0}")]
    Logging(String),

    /// Payload was not accepted (non-2xx status or no transport)
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for beacon-core
pub type Result<T> = std::result::Result<T, Error>;
