//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables of the permission engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a basic grant batch.
    pub max_uri_count: usize,
    /// Upper bound on privileged grants and authorization checks.
    pub max_privileged_uri_count: usize,
    /// Route local docs URIs through the sandbox policy manager instead of
    /// share files.
    pub grant_persist_uri_permission: bool,
    /// Emit audit events for grants.
    pub report_grant_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_uri_count: 500,
            max_privileged_uri_count: 200_000,
            grant_persist_uri_permission: false,
            report_grant_events: true,
        }
    }
}

impl EngineConfig {
    /// Config with the docs policy path enabled.
    pub fn with_persist_mode(mut self) -> Self {
        self.grant_persist_uri_permission = true;
        self
    }
}
