//! The permission manager object.
//!
//! One instance is built at service start and shared by every request
//! worker. It owns the ledger, both token indexes and the downstream
//! connections; the grant, verification and revocation engines are
//! implemented on it in their own modules.

use std::sync::Arc;

use upms_core::{permission, CallingContext, Result, TokenId, UpmsError, Uri, UriClass, UriFlags};
use upms_ledger::{GrantLedger, TokenIndex};
use upms_proxy::{Collaborator, ConnectionManager, Platform, TokenIdentityResolver};

use crate::backend::{ContentBackend, FileBackend, MediaBackend, Standing, UriBackend};
use crate::config::EngineConfig;

/// Process-wide URI permission state and the operations over it.
pub struct UriPermissionManager {
    pub(crate) config: EngineConfig,
    pub(crate) ledger: Arc<GrantLedger>,
    pub(crate) grant_index: Arc<TokenIndex>,
    pub(crate) content_index: Arc<TokenIndex>,
    pub(crate) connections: Arc<ConnectionManager>,
    pub(crate) identity: TokenIdentityResolver,
    pub(crate) platform: Platform,
    backends: Vec<Box<dyn UriBackend>>,
}

impl UriPermissionManager {
    /// Build a manager over `platform`. No downstream service is contacted.
    pub fn new(config: EngineConfig, platform: Platform) -> Self {
        let ledger = Arc::new(GrantLedger::new());
        let grant_index = Arc::new(TokenIndex::new());
        let content_index = Arc::new(TokenIndex::new());
        let connections = Arc::new(ConnectionManager::new(Arc::clone(
            &platform.system_abilities,
        )));
        let identity =
            TokenIdentityResolver::new(Arc::clone(&platform.token_kit), Arc::clone(&connections));

        let backends: Vec<Box<dyn UriBackend>> = vec![
            Box::new(FileBackend::new(
                config.clone(),
                Arc::clone(&ledger),
                Arc::clone(&grant_index),
                Arc::clone(&connections),
                Arc::clone(&platform.policy),
            )),
            Box::new(MediaBackend::new(Arc::clone(&connections))),
            Box::new(ContentBackend::new(
                Arc::clone(&connections),
                Arc::clone(&content_index),
            )),
        ];

        Self {
            config,
            ledger,
            grant_index,
            content_index,
            connections,
            identity,
            platform,
            backends,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The grant ledger.
    pub fn ledger(&self) -> &GrantLedger {
        &self.ledger
    }

    /// Tokens holding raw file grants.
    pub fn grant_index(&self) -> &TokenIndex {
        &self.grant_index
    }

    /// Tokens granted content URIs through the collaborator.
    pub fn content_index(&self) -> &TokenIndex {
        &self.content_index
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn identity(&self) -> &TokenIdentityResolver {
        &self.identity
    }

    /// Install the content-URI collaborator.
    pub fn register_collaborator(&self, collaborator: Arc<dyn Collaborator>) {
        self.connections.register_collaborator(collaborator);
    }

    pub(crate) fn backend_for(&self, class: UriClass) -> Option<&dyn UriBackend> {
        self.backends
            .iter()
            .find(|b| b.handles(class))
            .map(|b| b.as_ref())
    }

    pub(crate) fn backends(&self) -> impl Iterator<Item = &dyn UriBackend> {
        self.backends.iter().map(|b| b.as_ref())
    }

    /// Group URI positions by backend, keeping input order inside each
    /// group. URIs no backend handles are skipped.
    pub(crate) fn partition(&self, uris: &[&Uri]) -> Vec<(usize, Vec<usize>)> {
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
        for (pos, uri) in uris.iter().enumerate() {
            let class = uri.class();
            let Some(idx) = self.backends.iter().position(|b| b.handles(class)) else {
                continue;
            };
            match groups.iter_mut().find(|(i, _)| *i == idx) {
                Some((_, group)) => group.push(pos),
                None => groups.push((idx, vec![pos])),
            }
        }
        groups
    }

    pub(crate) fn backend_at(&self, idx: usize) -> &dyn UriBackend {
        self.backends[idx].as_ref()
    }

    /// Reject sandboxed callers.
    pub(crate) fn check_called_by_sandbox(&self, ctx: &CallingContext) -> Result<()> {
        let app = self.connections.app_manager().map_err(|e| {
            tracing::error!(error = %e, "app manager unavailable");
            UpmsError::from(e)
        })?;
        match app.judge_sandbox_by_pid(ctx.pid) {
            Ok(false) => Ok(()),
            Ok(true) => {
                tracing::error!(pid = ctx.pid, "sandbox application can not grant uri permission");
                Err(UpmsError::GrantUriPermissionDenied)
            }
            Err(e) => {
                tracing::error!(error = %e, "judge sandbox by pid failed");
                Err(UpmsError::InnerError)
            }
        }
    }

    /// Per-URI standing of `token`: does it hold each URI on its own, or
    /// through a re-shareable grant?
    ///
    /// Backends answer first; every unresolved non-media URI then escalates
    /// to the proxy-authorization path, which costs one ledger verify per URI.
    pub(crate) fn check_standing(
        &self,
        ctx: &CallingContext,
        uris: &[&Uri],
        flag: UriFlags,
        token: TokenId,
    ) -> Vec<bool> {
        let mut result = vec![false; uris.len()];
        if uris.is_empty() {
            return result;
        }

        let alterable_name = self.identity.resolve_alterable_bundle_name(token);
        let standing = Standing {
            token,
            flag,
            alterable_name: alterable_name.as_deref(),
            file_access_manager: self
                .identity
                .verify_permission(token, permission::FILE_ACCESS_MANAGER),
            foundation_call: self.identity.is_foundation_call(ctx),
        };

        for (idx, positions) in self.partition(uris) {
            let group: Vec<&Uri> = positions.iter().map(|&pos| uris[pos]).collect();
            let answers = self.backend_at(idx).check(&group, &standing);
            for (pos, ok) in positions.into_iter().zip(answers) {
                result[pos] = ok;
            }
        }

        let residual: Vec<usize> = (0..uris.len())
            .filter(|&i| !result[i] && uris[i].class() != UriClass::Media)
            .collect();
        if residual.is_empty() {
            return result;
        }
        if !self
            .identity
            .verify_permission(token, permission::PROXY_AUTHORIZATION_URI)
        {
            return result;
        }
        for i in residual {
            result[i] = self.verify_ledger(uris[i], flag, token);
        }
        result
    }
}
