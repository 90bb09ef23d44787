//! Service configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use upms_engine::EngineConfig;

use crate::error::Result;

/// Largest request payload the stub accepts.
pub const DEFAULT_MAX_RAW_PAYLOAD_BYTES: usize = 128 * 1024 * 1024;

/// Configuration for the service.
///
/// Missing fields take their defaults, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Engine tunables.
    pub engine: EngineConfig,
    /// Requests larger than this are answered with `DeadObject`.
    pub max_raw_payload_bytes: usize,
    /// Pending requests the server queues before callers wait.
    pub request_queue_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            max_raw_payload_bytes: DEFAULT_MAX_RAW_PAYLOAD_BYTES,
            request_queue_depth: 64,
        }
    }
}

impl ServiceConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = ServiceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.engine.max_uri_count, 500);
        assert_eq!(config.engine.max_privileged_uri_count, 200_000);
    }

    #[test]
    fn test_partial_engine_section() {
        let config = ServiceConfig::from_json_str(
            r#"{ "engine": { "grant_persist_uri_permission": true }, "request_queue_depth": 8 }"#,
        )
        .unwrap();
        assert!(config.engine.grant_persist_uri_permission);
        assert_eq!(config.engine.max_uri_count, 500);
        assert_eq!(config.request_queue_depth, 8);
        assert_eq!(config.max_raw_payload_bytes, DEFAULT_MAX_RAW_PAYLOAD_BYTES);
    }

    #[test]
    fn test_malformed_document() {
        let err = ServiceConfig::from_json_str("{ engine: ").unwrap_err();
        assert!(matches!(err, crate::ServiceError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::from_file("/nonexistent/upms.json").unwrap_err();
        assert!(matches!(err, crate::ServiceError::Io(_)));
    }
}
