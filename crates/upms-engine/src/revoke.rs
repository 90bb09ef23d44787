//! Revocation Engine.
//!
//! Ledger entries are always erased first, under the ledger lock; the
//! matching share-file deletions are issued after the lock is released so a
//! concurrent re-grant of the same URI is never removed by a stale batch.

use upms_core::{CallingContext, Result, TokenId, UpmsError, Uri, UriClass};

use crate::backend::{delete_share_files, RevokeOne};
use crate::manager::UriPermissionManager;

impl UriPermissionManager {
    /// Drop every grant held by or issued by `token`, and every grant over
    /// the token's own URIs. Foundation only.
    ///
    /// Idempotent: a token with nothing left to revoke succeeds.
    pub fn revoke_all_uri_permissions(&self, ctx: &CallingContext, token: TokenId) -> Result<()> {
        tracing::info!(token = %token, "revoke all uri permissions");
        if !self.identity.is_foundation_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "no permission to revoke all");
            return Err(UpmsError::CheckPermissionFailed);
        }

        let own_authority = self.identity.resolve_alterable_bundle_name(token);

        let mut result = Ok(());
        for backend in self.backends() {
            if let Err(e) = backend.revoke_all(token, own_authority.as_deref()) {
                tracing::warn!(backend = backend.name(), error = %e, "revoke all failed");
                result = Err(e);
            }
        }
        result
    }

    /// Drop `ability_id` from `token`'s auto-remove grants, erasing those no
    /// ability holds any more. Foundation only; other callers are ignored.
    pub fn revoke_uri_permission(&self, ctx: &CallingContext, token: TokenId, ability_id: i32) {
        tracing::info!(token = %token, ability_id, "remove uri permission");
        if !self.identity.is_foundation_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "no permission to revoke uri permission");
            return;
        }
        if !self.grant_index.contains(token) {
            return;
        }

        // Stale index entries are cleared by revoke-all.
        let uris = self.ledger.remove_ability(token, ability_id);
        if uris.is_empty() {
            return;
        }
        if let Err(e) = delete_share_files(&self.connections, token, &uris) {
            tracing::warn!(token = %token, error = %e, "delete share file after ability exit failed");
        }
    }

    /// Revoke the grant of `uri` to the installed `(bundle_name, app_index)`.
    ///
    /// The IPC caller must be the grantor, the grantee, or the owner of the
    /// URI's authority. Revoking an absent grant succeeds.
    pub fn revoke_uri_permission_manually(
        &self,
        ctx: &CallingContext,
        uri: &str,
        bundle_name: &str,
        app_index: i32,
    ) -> Result<()> {
        tracing::info!(bundle_name, app_index, "revoke uri permission manually");
        if !self.identity.is_sa_or_system_app_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "not sa or system app");
            return Err(UpmsError::NotSystemApp);
        }

        let uri = Uri::parse(uri);
        let class = uri.class();
        let Some(backend) = self.backend_for(class).filter(|_| class != UriClass::Invalid) else {
            tracing::error!(scheme = uri.scheme(), "invalid uri type");
            return Err(UpmsError::InvalidUriType);
        };

        let target = self.identity.resolve_token_id(bundle_name, app_index)?;
        let caller_owns_authority = self
            .identity
            .resolve_alterable_bundle_name(ctx.token_id)
            .map(|name| name == uri.authority())
            .unwrap_or(false);

        backend.revoke_one(&RevokeOne {
            uri: uri.as_str(),
            caller: ctx.token_id,
            target,
            caller_owns_authority,
        })
    }
}
