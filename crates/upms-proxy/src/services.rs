//! Contracts of the services the permission manager calls into.
//!
//! Remote system services (storage, app, bundle and media managers) extend
//! [`Remote`] so their handles can be death-watched by the connection cache.
//! The collaborator is registered by its owner instead of being looked up.
//! The access-token kit, policy manager, UDMF resolver and event reporter
//! are in-process libraries.
//!
//! Every call is synchronous: the calling worker blocks until the service
//! answers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use upms_core::{TokenId, UriFlags};

use crate::error::Result;

// ───────────────────────────────────────────────────────────────────────────
// Remote liveness
// ───────────────────────────────────────────────────────────────────────────

/// Observer notified when a remote service dies.
pub trait DeathRecipient: Send + Sync {
    /// Called once, from the transport's notification thread.
    fn on_remote_died(&self);
}

/// A handle to a service living in another process.
pub trait Remote: Send + Sync {
    /// Register a liveness observer. Returns false if the remote refused it.
    ///
    /// Implementations must not invoke the recipient from inside this call.
    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool;
}

// ───────────────────────────────────────────────────────────────────────────
// Storage manager
// ───────────────────────────────────────────────────────────────────────────

/// Per-URI outcome of share-file creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareFileStatus {
    /// A new share file was created.
    Created,
    /// A share file for this URI and grantee already existed.
    AlreadyExists,
    /// Creation failed with the given errno-style code.
    Failed(i32),
}

impl ShareFileStatus {
    /// `-EEXIST` as reported by the storage manager.
    pub const EEXIST: i32 = -17;

    /// Map a raw status code.
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => ShareFileStatus::Created,
            Self::EEXIST => ShareFileStatus::AlreadyExists,
            other => ShareFileStatus::Failed(other),
        }
    }

    /// The grant is usable: created now or already present.
    pub const fn is_materialized(&self) -> bool {
        matches!(self, ShareFileStatus::Created | ShareFileStatus::AlreadyExists)
    }
}

/// Materializes file-URI grants as OS-level share files.
pub trait StorageManager: Remote {
    /// Create share files for `uris` on behalf of `target`. The reply has
    /// one status per input URI.
    fn create_share_file(
        &self,
        uris: &[String],
        target: TokenId,
        flag: UriFlags,
    ) -> Result<Vec<ShareFileStatus>>;

    /// Delete `target`'s share files for `uris`.
    fn delete_share_file(&self, target: TokenId, uris: &[String]) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────────────────
// App and bundle managers
// ───────────────────────────────────────────────────────────────────────────

/// Process classification queries.
pub trait AppManager: Remote {
    /// True if the process is a sandboxed app.
    fn judge_sandbox_by_pid(&self, pid: i32) -> Result<bool>;
}

/// Installed-application queries.
pub trait BundleManager: Remote {
    /// Token id of the installed `(bundle_name, app_index)` for `user_id`.
    /// `Ok(None)` if no such app is installed.
    fn application_token_id(
        &self,
        bundle_name: &str,
        app_index: i32,
        user_id: i32,
    ) -> Result<Option<TokenId>>;

    /// The data directory name of a bundle instance. For clones and
    /// sandboxed instances this differs from the bundle name and is the
    /// authority their file URIs carry.
    fn dir_by_bundle_and_app_index(&self, bundle_name: &str, app_index: i32) -> Result<String>;

    /// True if the installed bundle is a system app.
    fn is_system_app_bundle(&self, bundle_name: &str, user_id: i32) -> Result<bool>;

    /// The foreground OS account.
    fn current_user_id(&self) -> i32;
}

// ───────────────────────────────────────────────────────────────────────────
// Media and content backends
// ───────────────────────────────────────────────────────────────────────────

/// Grant/check/revoke for the media library. Owns its own records.
pub trait MediaPermissionManager: Remote {
    fn grant_uri_permission(
        &self,
        uris: &[String],
        flag: UriFlags,
        caller: TokenId,
        target: TokenId,
    ) -> Result<()>;

    /// One result per input URI.
    fn check_uri_permission(&self, uris: &[String], flag: UriFlags, token: TokenId) -> Vec<bool>;

    fn revoke_uri_permission(&self, caller: TokenId, target: TokenId, uri: &str) -> Result<()>;
}

/// Pluggable handler for `content://` URIs.
///
/// The permission manager only remembers which tokens were granted through
/// it, never the grants themselves.
pub trait Collaborator: Send + Sync {
    fn grant_uri_permission(
        &self,
        uris: &[String],
        flag: UriFlags,
        target: TokenId,
        target_bundle: &str,
    ) -> Result<()>;

    /// Drop every grant held by `target`.
    fn revoke_uri_permission(&self, target: TokenId) -> Result<()>;

    /// One result per input URI.
    fn check_uri_authorization(&self, uris: &[String], flag: UriFlags, token: TokenId)
        -> Vec<bool>;
}

// ───────────────────────────────────────────────────────────────────────────
// In-process libraries
// ───────────────────────────────────────────────────────────────────────────

/// Kind of identity a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// An installed application.
    Hap,
    /// A native system service.
    Native,
    /// A shell process.
    Shell,
    /// Unknown token.
    Invalid,
}

/// Application identity behind a `Hap` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HapTokenInfo {
    pub bundle_name: String,
    /// Clone or sandbox instance index; `0` for the main instance.
    pub inst_index: i32,
    pub user_id: i32,
}

/// Access-control subsystem queries.
pub trait AccessTokenKit: Send + Sync {
    fn token_type(&self, token: TokenId) -> TokenType;

    /// `None` unless `token` is a `Hap` token.
    fn hap_token_info(&self, token: TokenId) -> Option<HapTokenInfo>;

    /// True if `token` holds the named permission.
    fn verify_permission(&self, token: TokenId, permission: &str) -> bool;

    /// True if `token` is a system application.
    fn is_system_app(&self, token: TokenId) -> bool;
}

/// Policy mode bits.
pub mod policy_mode {
    pub const READ: u32 = 1;
    pub const WRITE: u32 = 2;
}

/// One path policy for the sandbox policy manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInfo {
    pub path: String,
    pub mode: u32,
}

impl PolicyInfo {
    /// Build a policy from a URI and a request flag. WRITE wins over READ.
    pub fn from_flag(path: impl Into<String>, flag: UriFlags) -> Self {
        let mode = if flag.intersects(UriFlags::WRITE) {
            policy_mode::WRITE
        } else {
            policy_mode::READ
        };
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// Coarse path-policy mechanism layered alongside URI grants.
pub trait PolicyManager: Send + Sync {
    /// One result per policy: whether `target` may hold it persistently.
    fn check_persist_policy(&self, target: TokenId, policies: &[PolicyInfo]) -> Vec<bool>;

    /// Activate `policies` for `target`.
    fn set_policy(&self, target: TokenId, policies: &[PolicyInfo], persistable: bool)
        -> Result<()>;

    /// Keep `policies` across restarts.
    fn persist_policy(&self, target: TokenId, policies: &[PolicyInfo]) -> Result<()>;

    /// Drop every policy held by `token`.
    fn unset_all_policy_by_token(&self, token: TokenId) -> Result<()>;
}

/// Resolves a published drag-and-drop or clipboard key to its URIs.
pub trait UdmfKeyResolver: Send + Sync {
    fn uris_by_key(&self, key: &str) -> Result<Vec<String>>;
}

/// Audit events emitted by the grant path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantEvent {
    /// A system app granted URIs to a non-system app.
    GrantUriPermission {
        caller_bundle: String,
        target_bundle: String,
        /// `scheme:authority` of the first granted URI.
        uri: String,
    },
    /// A grant dropped URIs the caller had no standing on.
    ShareUnprivilegedUri {
        caller_bundle: String,
        target_bundle: String,
    },
}

/// Best-effort sink for [`GrantEvent`]s. Must not block.
pub trait EventReporter: Send + Sync {
    fn report(&self, event: GrantEvent);
}
