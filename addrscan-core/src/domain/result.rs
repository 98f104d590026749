//! Result and error types for the core library

use thiserror::Error;

use crate::ports::TransportError;

/// Core library error type
///
/// Retriable conditions (throttling, clock skew, transient network errors)
/// never reach this type on eventual success; they are absorbed by the
/// backoff controller.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or placeholder credentials, bad settings. Fatal before any request.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local signature computation failed. Fatal before any request.
    #[error("Signature error: {0}")]
    Signature(String),

    /// A transport failure that retrying cannot fix
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The exchange rejected the request with a non-retriable code
    #[error("Exchange error {code}: {message}")]
    Exchange { code: String, message: String },

    /// Every attempt allowed by the retry policy was used up
    #[error("Retries exhausted after {attempts} attempts (last code: {})", .last_code.as_deref().unwrap_or("none"))]
    RetriesExhausted {
        attempts: u32,
        last_code: Option<String>,
    },

    /// The asset/network catalog could not be fetched; nothing can be scanned
    #[error("Catalog fetch failed: {0}")]
    Catalog(Box<Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an exchange error from a code and message
    pub fn exchange(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exchange {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run rather than a single asset
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Signature(_) | Self::Catalog(_))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
