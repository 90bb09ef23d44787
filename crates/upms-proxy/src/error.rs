//! Error types for downstream service calls.

use thiserror::Error;

use upms_core::UpmsError;

use crate::connection::ServiceId;

/// Errors returned by downstream services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The service could not be resolved or is not registered.
    #[error("service unavailable: {0}")]
    Unavailable(ServiceId),

    /// The remote answered with a non-zero status.
    #[error("remote call failed with code {0}")]
    CallFailed(i32),

    /// The reply did not have the expected shape.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

impl From<ProxyError> for UpmsError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Unavailable(ServiceId::BundleManager) => UpmsError::BundleManagerUnavailable,
            _ => UpmsError::InnerError,
        }
    }
}

/// Result type for downstream calls.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downstream_errors_degrade_to_inner() {
        assert_eq!(
            UpmsError::from(ProxyError::Unavailable(ServiceId::StorageManager)),
            UpmsError::InnerError
        );
        assert_eq!(UpmsError::from(ProxyError::CallFailed(-1)), UpmsError::InnerError);
        assert_eq!(
            UpmsError::from(ProxyError::Unavailable(ServiceId::BundleManager)),
            UpmsError::BundleManagerUnavailable
        );
    }
}
