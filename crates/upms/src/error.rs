//! Error types for the service layer.

use thiserror::Error;
use upms_core::UpmsError;

/// Errors that can occur outside the permission engines: wire codec,
/// configuration loading and transport.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered with a non-zero code.
    #[error("permission error: {0}")]
    Permission(#[from] UpmsError),

    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The request never reached the service or its reply was lost.
    #[error("transport error: {0}")]
    Transport(String),

    /// Reply body does not match the request.
    #[error("unexpected reply for {0}")]
    UnexpectedReply(&'static str),
}

impl ServiceError {
    /// The wire code this error corresponds to, if it came from the service.
    pub fn code(&self) -> Option<i32> {
        match self {
            ServiceError::Permission(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
