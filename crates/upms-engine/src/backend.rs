//! Backend strategies.
//!
//! One logical grant fans out to up to three backends, chosen by the URI
//! class: the file backend (ledger plus storage-manager share files), the
//! media backend (media permission manager) and the content backend (the
//! pluggable collaborator). Each implements [`UriBackend`]; the engines only
//! partition URIs and dispatch, so a new URI class needs a new backend and
//! nothing else.

use std::sync::Arc;

use upms_core::{GrantRecord, Result, TokenId, UpmsError, Uri, UriClass, UriFlags};
use upms_ledger::{GrantLedger, TokenIndex};
use upms_proxy::{ConnectionManager, PolicyInfo, PolicyManager};

use crate::config::EngineConfig;

/// One partition of a grant, already authorized.
#[derive(Debug, Clone)]
pub struct GrantBatch<'a> {
    /// URIs of this backend's classes.
    pub uris: &'a [String],
    /// Request flag, including the persist bit.
    pub flag: UriFlags,
    /// Effective grantor.
    pub caller: TokenId,
    /// Grantee.
    pub target: TokenId,
    pub target_bundle: &'a str,
    pub ability_id: i32,
    pub caller_is_system_app: bool,
}

/// Identity a standing check is evaluated for.
#[derive(Debug, Clone)]
pub struct Standing<'a> {
    pub token: TokenId,
    pub flag: UriFlags,
    /// Authority of the token's own file URIs.
    pub alterable_name: Option<&'a str>,
    /// Token holds `FILE_ACCESS_MANAGER`.
    pub file_access_manager: bool,
    /// The IPC caller is the foundation process.
    pub foundation_call: bool,
}

/// A single-grant revocation.
#[derive(Debug, Clone)]
pub struct RevokeOne<'a> {
    pub uri: &'a str,
    pub caller: TokenId,
    pub target: TokenId,
    /// The caller owns the URI's authority.
    pub caller_owns_authority: bool,
}

/// Common capability of the per-class backends.
pub trait UriBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// True if URIs of `class` are routed here.
    fn handles(&self, class: UriClass) -> bool;

    /// Grant the batch. Returns the URIs actually granted; an error means
    /// nothing was.
    fn grant(&self, batch: &GrantBatch<'_>) -> Result<Vec<String>>;

    /// Does `standing.token` hold these URIs on its own? One result per URI.
    fn check(&self, uris: &[&Uri], standing: &Standing<'_>) -> Vec<bool>;

    /// Remove one grant. Revoking an absent grant succeeds.
    fn revoke_one(&self, request: &RevokeOne<'_>) -> Result<()>;

    /// Remove everything held by or issued by `token`.
    fn revoke_all(&self, _token: TokenId, _own_authority: Option<&str>) -> Result<()> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────────────────
// File backend
// ───────────────────────────────────────────────────────────────────────────

/// `file://` URIs outside the media library.
pub struct FileBackend {
    config: EngineConfig,
    ledger: Arc<GrantLedger>,
    grant_index: Arc<TokenIndex>,
    connections: Arc<ConnectionManager>,
    policy: Arc<dyn PolicyManager>,
}

impl FileBackend {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<GrantLedger>,
        grant_index: Arc<TokenIndex>,
        connections: Arc<ConnectionManager>,
        policy: Arc<dyn PolicyManager>,
    ) -> Self {
        Self {
            config,
            ledger,
            grant_index,
            connections,
            policy,
        }
    }

    fn grant_share_files(&self, uris: &[String], batch: &GrantBatch<'_>) -> Result<Vec<String>> {
        let flag = batch.flag.access();
        let storage = self.connections.storage_manager().map_err(|e| {
            tracing::error!(error = %e, "storage manager unavailable");
            UpmsError::from(e)
        })?;
        let statuses = storage
            .create_share_file(uris, batch.target, flag)
            .map_err(|e| {
                tracing::error!(error = %e, "create share file failed");
                UpmsError::from(e)
            })?;
        if statuses.len() != uris.len() {
            tracing::error!(
                expected = uris.len(),
                got = statuses.len(),
                "create share file reply size mismatch"
            );
            return Err(UpmsError::InnerError);
        }

        let mut granted = Vec::new();
        for (uri, status) in uris.iter().zip(&statuses) {
            if !status.is_materialized() {
                tracing::warn!(?status, "share file not created");
                continue;
            }
            let record = GrantRecord::new(flag, batch.caller, batch.target, batch.ability_id);
            self.ledger.add_or_merge(uri, record);
            granted.push(uri.clone());
        }

        if granted.is_empty() {
            return Err(UpmsError::InnerError);
        }
        self.grant_index.insert(batch.target);
        tracing::info!(
            target_token = %batch.target,
            count = granted.len(),
            "file uri permissions added"
        );
        Ok(granted)
    }

    fn grant_policies(&self, uris: &[String], batch: &GrantBatch<'_>) -> Result<Vec<String>> {
        let policies: Vec<PolicyInfo> = uris
            .iter()
            .map(|uri| PolicyInfo::from_flag(uri.as_str(), batch.flag))
            .collect();

        let allowed = self.policy.check_persist_policy(batch.target, &policies);
        if allowed.len() != policies.len() {
            tracing::error!("check persist policy reply size mismatch");
            return Err(UpmsError::InnerError);
        }
        let policies: Vec<PolicyInfo> = policies
            .into_iter()
            .zip(allowed)
            .filter_map(|(policy, ok)| ok.then_some(policy))
            .collect();
        if policies.is_empty() {
            return Err(UpmsError::InnerError);
        }

        let persistable = batch.flag.intersects(UriFlags::PERSISTABLE);
        self.policy
            .set_policy(batch.target, &policies, persistable)
            .map_err(|e| {
                tracing::error!(error = %e, "set policy failed");
                UpmsError::from(e)
            })?;
        if persistable && batch.caller_is_system_app {
            if let Err(e) = self.policy.persist_policy(batch.target, &policies) {
                tracing::warn!(error = %e, "persist policy failed");
            }
        }
        Ok(policies.into_iter().map(|p| p.path).collect())
    }

    fn uses_policy(&self, uri: &str) -> bool {
        self.config.grant_persist_uri_permission
            && Uri::parse(uri).class() == UriClass::FileDocs
    }
}

impl UriBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn handles(&self, class: UriClass) -> bool {
        class.is_file()
    }

    fn grant(&self, batch: &GrantBatch<'_>) -> Result<Vec<String>> {
        let (docs, files): (Vec<String>, Vec<String>) =
            batch.uris.iter().cloned().partition(|uri| self.uses_policy(uri));

        tracing::debug!(docs = docs.len(), files = files.len(), "file grant partition");

        let files_result = (!files.is_empty()).then(|| self.grant_share_files(&files, batch));
        let docs_result = (!docs.is_empty()).then(|| self.grant_policies(&docs, batch));

        match (files_result, docs_result) {
            (Some(Ok(mut a)), Some(Ok(b))) => {
                a.extend(b);
                Ok(a)
            }
            (Some(Ok(a)), _) | (_, Some(Ok(a))) => Ok(a),
            (Some(Err(e)), _) | (_, Some(Err(e))) => Err(e),
            (None, None) => Err(UpmsError::InnerError),
        }
    }

    fn check(&self, uris: &[&Uri], standing: &Standing<'_>) -> Vec<bool> {
        uris.iter()
            .map(|uri| match uri.class() {
                UriClass::FileDocs | UriClass::FileDocsCloud => standing.file_access_manager,
                UriClass::FileBundle => standing
                    .alterable_name
                    .map(|name| name == uri.authority())
                    .unwrap_or(false),
                _ => false,
            })
            .collect()
    }

    fn revoke_one(&self, request: &RevokeOne<'_>) -> Result<()> {
        let removed = self.ledger.erase_one_grant(
            request.uri,
            request.caller,
            request.target,
            request.caller_owns_authority,
        );
        if !removed {
            tracing::info!(target_token = %request.target, "no grant to revoke");
            return Ok(());
        }
        delete_share_files(&self.connections, request.target, &[request.uri.to_string()])
    }

    fn revoke_all(&self, token: TokenId, own_authority: Option<&str>) -> Result<()> {
        // Index before ledger: a racing grant re-inserts after its ledger write.
        self.grant_index.remove(token);
        let revoked = self.ledger.erase_all_for_token(token, own_authority);

        let mut result = Ok(());
        for (grantee, uris) in &revoked {
            if let Err(e) = delete_share_files(&self.connections, *grantee, uris) {
                result = Err(e);
            }
        }

        if self.config.grant_persist_uri_permission {
            if let Err(e) = self.policy.unset_all_policy_by_token(token) {
                tracing::warn!(token = %token, error = %e, "unset policy failed");
            }
        }
        result
    }
}

/// Delete `target`'s share files for `uris`.
pub(crate) fn delete_share_files(
    connections: &ConnectionManager,
    target: TokenId,
    uris: &[String],
) -> Result<()> {
    if uris.is_empty() {
        return Ok(());
    }
    let storage = connections.storage_manager().map_err(|e| {
        tracing::error!(error = %e, "storage manager unavailable");
        UpmsError::from(e)
    })?;
    storage.delete_share_file(target, uris).map_err(|e| {
        tracing::error!(target_token = %target, error = %e, "delete share file failed");
        UpmsError::from(e)
    })
}

// ───────────────────────────────────────────────────────────────────────────
// Media backend
// ───────────────────────────────────────────────────────────────────────────

/// `file://media` and `content://media` URIs.
pub struct MediaBackend {
    connections: Arc<ConnectionManager>,
}

impl MediaBackend {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }
}

impl UriBackend for MediaBackend {
    fn name(&self) -> &'static str {
        "media"
    }

    fn handles(&self, class: UriClass) -> bool {
        class == UriClass::Media
    }

    fn grant(&self, batch: &GrantBatch<'_>) -> Result<Vec<String>> {
        let media = self.connections.media_permission_manager().map_err(|e| {
            tracing::error!(error = %e, "media permission manager unavailable");
            UpmsError::from(e)
        })?;
        media
            .grant_uri_permission(batch.uris, batch.flag.access(), batch.caller, batch.target)
            .map_err(|e| {
                tracing::error!(error = %e, "media grant failed");
                UpmsError::from(e)
            })?;
        Ok(batch.uris.to_vec())
    }

    fn check(&self, uris: &[&Uri], standing: &Standing<'_>) -> Vec<bool> {
        let Ok(media) = self.connections.media_permission_manager() else {
            tracing::warn!("media permission manager unavailable");
            return vec![false; uris.len()];
        };
        let raw: Vec<String> = uris.iter().map(|u| u.as_str().to_string()).collect();
        let result = media.check_uri_permission(&raw, standing.flag, standing.token);
        if result.len() != uris.len() {
            tracing::error!("media check reply size mismatch");
            return vec![false; uris.len()];
        }
        result
    }

    fn revoke_one(&self, request: &RevokeOne<'_>) -> Result<()> {
        let media = self
            .connections
            .media_permission_manager()?;
        media
            .revoke_uri_permission(request.caller, request.target, request.uri)
            .map_err(|e| {
                tracing::error!(error = %e, "media revoke failed");
                UpmsError::from(e)
            })
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Content backend
// ───────────────────────────────────────────────────────────────────────────

/// `content://` URIs owned by the collaborator.
pub struct ContentBackend {
    connections: Arc<ConnectionManager>,
    content_index: Arc<TokenIndex>,
}

impl ContentBackend {
    pub fn new(connections: Arc<ConnectionManager>, content_index: Arc<TokenIndex>) -> Self {
        Self {
            connections,
            content_index,
        }
    }
}

impl UriBackend for ContentBackend {
    fn name(&self) -> &'static str {
        "content"
    }

    fn handles(&self, class: UriClass) -> bool {
        class == UriClass::Content
    }

    fn grant(&self, batch: &GrantBatch<'_>) -> Result<Vec<String>> {
        let collaborator = self.connections.collaborator().map_err(|e| {
            tracing::error!(error = %e, "collaborator not registered");
            UpmsError::from(e)
        })?;
        collaborator
            .grant_uri_permission(
                batch.uris,
                batch.flag.access(),
                batch.target,
                batch.target_bundle,
            )
            .map_err(|e| {
                tracing::error!(error = %e, "collaborator grant failed");
                UpmsError::from(e)
            })?;
        self.content_index.insert(batch.target);
        Ok(batch.uris.to_vec())
    }

    fn check(&self, uris: &[&Uri], standing: &Standing<'_>) -> Vec<bool> {
        if standing.foundation_call {
            return vec![true; uris.len()];
        }
        let Ok(collaborator) = self.connections.collaborator() else {
            return vec![false; uris.len()];
        };
        let raw: Vec<String> = uris.iter().map(|u| u.as_str().to_string()).collect();
        let result = collaborator.check_uri_authorization(&raw, standing.flag, standing.token);
        if result.len() != uris.len() {
            tracing::error!("collaborator check reply size mismatch");
            return vec![false; uris.len()];
        }
        result
    }

    fn revoke_one(&self, _request: &RevokeOne<'_>) -> Result<()> {
        Err(UpmsError::InvalidUriType)
    }

    fn revoke_all(&self, token: TokenId, _own_authority: Option<&str>) -> Result<()> {
        if !self.content_index.contains(token) {
            return Ok(());
        }
        let collaborator = self.connections.collaborator().map_err(|e| {
            tracing::error!(error = %e, "collaborator not registered");
            UpmsError::from(e)
        })?;
        collaborator.revoke_uri_permission(token).map_err(|e| {
            tracing::error!(token = %token, error = %e, "collaborator revoke failed");
            UpmsError::from(e)
        })?;
        self.content_index.remove(token);
        Ok(())
    }
}
