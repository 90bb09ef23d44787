//! Error types for the URI permission manager.
//!
//! Every variant carries a stable integer code. Engines propagate
//! `UpmsError` with `?`; only the RPC boundary flattens it to `i32`.

use thiserror::Error;

/// Errors surfaced by grant, verify and revoke operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UpmsError {
    /// Bundle manager could not be reached.
    #[error("bundle manager service unavailable")]
    BundleManagerUnavailable,

    /// A downstream service failed or is absent.
    #[error("inner error")]
    InnerError,

    /// Caller lacks the identity or permission the operation requires.
    #[error("check permission failed")]
    CheckPermissionFailed,

    /// Caller is neither a system ability nor a system app.
    #[error("caller is not a system app")]
    NotSystemApp,

    /// Flag does not intersect READ|WRITE.
    #[error("invalid uri flag")]
    InvalidUriFlag,

    /// URI scheme or authority is not supported.
    #[error("invalid uri type")]
    InvalidUriType,

    /// Sandboxed callers may not grant.
    #[error("sandbox application can not grant uri permission")]
    GrantUriPermissionDenied,

    /// Batch is empty or exceeds its bound.
    #[error("uri list out of range")]
    UriListOutOfRange,

    /// Target bundle / app index pair is not installed.
    #[error("target bundle does not exist")]
    TargetBundleNotExist,

    /// Caller token is invalid for a key-based grant.
    #[error("invalid caller token id")]
    InvalidCallerTokenId,

    /// Target token is invalid for a key-based grant.
    #[error("invalid target token id")]
    InvalidTargetTokenId,

    /// Service has not finished initialisation.
    #[error("service not ready")]
    ServiceNotReady,

    /// Request could not be decoded.
    #[error("invalid value")]
    InvalidValue,

    /// Request payload was unreadable or oversized.
    #[error("dead object")]
    DeadObject,

    /// A code this build does not know.
    #[error("unknown error code {0}")]
    Unknown(i32),
}

impl UpmsError {
    /// Integer code sent over the wire.
    pub const fn code(&self) -> i32 {
        match self {
            UpmsError::BundleManagerUnavailable => 2097165,
            UpmsError::InnerError => 2097167,
            UpmsError::CheckPermissionFailed => 2097177,
            UpmsError::NotSystemApp => 2097209,
            UpmsError::InvalidUriFlag => 2097212,
            UpmsError::InvalidUriType => 2097213,
            UpmsError::GrantUriPermissionDenied => 2097216,
            UpmsError::UriListOutOfRange => 2097245,
            UpmsError::TargetBundleNotExist => 2097283,
            UpmsError::InvalidCallerTokenId => 2097290,
            UpmsError::InvalidTargetTokenId => 2097291,
            UpmsError::ServiceNotReady => 2097300,
            UpmsError::InvalidValue => 22,
            UpmsError::DeadObject => -32,
            UpmsError::Unknown(code) => *code,
        }
    }

    /// Inverse of [`UpmsError::code`]. Returns `None` for success (`0`).
    pub fn from_code(code: i32) -> Option<Self> {
        let err = match code {
            0 => return None,
            2097165 => UpmsError::BundleManagerUnavailable,
            2097167 => UpmsError::InnerError,
            2097177 => UpmsError::CheckPermissionFailed,
            2097209 => UpmsError::NotSystemApp,
            2097212 => UpmsError::InvalidUriFlag,
            2097213 => UpmsError::InvalidUriType,
            2097216 => UpmsError::GrantUriPermissionDenied,
            2097245 => UpmsError::UriListOutOfRange,
            2097283 => UpmsError::TargetBundleNotExist,
            2097290 => UpmsError::InvalidCallerTokenId,
            2097291 => UpmsError::InvalidTargetTokenId,
            2097300 => UpmsError::ServiceNotReady,
            22 => UpmsError::InvalidValue,
            -32 => UpmsError::DeadObject,
            other => UpmsError::Unknown(other),
        };
        Some(err)
    }

    /// Flatten a result into its wire code.
    pub fn result_code(result: &Result<()>) -> i32 {
        match result {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, UpmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        let all = [
            UpmsError::BundleManagerUnavailable,
            UpmsError::InnerError,
            UpmsError::CheckPermissionFailed,
            UpmsError::NotSystemApp,
            UpmsError::InvalidUriFlag,
            UpmsError::InvalidUriType,
            UpmsError::GrantUriPermissionDenied,
            UpmsError::UriListOutOfRange,
            UpmsError::TargetBundleNotExist,
            UpmsError::InvalidCallerTokenId,
            UpmsError::InvalidTargetTokenId,
            UpmsError::ServiceNotReady,
            UpmsError::InvalidValue,
            UpmsError::DeadObject,
        ];
        for err in all {
            assert_eq!(UpmsError::from_code(err.code()), Some(err));
        }
    }

    #[test]
    fn test_zero_is_success() {
        assert_eq!(UpmsError::from_code(0), None);
        assert_eq!(UpmsError::result_code(&Ok(())), 0);
        assert_eq!(
            UpmsError::result_code(&Err(UpmsError::InnerError)),
            2097167
        );
    }

    #[test]
    fn test_unknown_code_preserved() {
        assert_eq!(UpmsError::from_code(77), Some(UpmsError::Unknown(77)));
        assert_eq!(UpmsError::Unknown(77).code(), 77);
    }
}
