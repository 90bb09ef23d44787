//! Grant Engine.
//!
//! Four entry points share one pipeline:
//!
//! 1. entry-specific caller checks, size bound and flag validation
//! 2. target resolution and choice of the effective grantor
//! 3. per-URI standing ([`UriPermissionManager::check_standing`]); URIs the
//!    grantor cannot share are dropped, the call fails only if none remain
//! 4. partition by backend and dispatch; the call succeeds if any backend
//!    granted anything
//! 5. best-effort audit events
//!
//! The privileged entry point skips step 3.

use upms_core::{
    permission, CallingContext, Result, TokenId, UpmsError, Uri, UriClass, UriFlags,
    DEFAULT_ABILITY_ID,
};

use crate::backend::GrantBatch;
use crate::manager::UriPermissionManager;

/// Identity of one grant after resolution.
struct GrantParties<'a> {
    caller: TokenId,
    target: TokenId,
    target_bundle: &'a str,
    ability_id: i32,
}

impl UriPermissionManager {
    /// Grant `uris` to the installed `(target_bundle, app_index)`.
    ///
    /// When the IPC caller is the foundation process or a UDMF/pasteboard
    /// relay, `initiator` is trusted as the grantor. `ability_id` ties the
    /// grant to an ability and is honored only for foundation calls.
    #[allow(clippy::too_many_arguments)]
    pub fn grant_uri_permission(
        &self,
        ctx: &CallingContext,
        uris: &[String],
        flag: UriFlags,
        target_bundle: &str,
        app_index: i32,
        initiator: TokenId,
        ability_id: i32,
    ) -> Result<()> {
        tracing::info!(
            target_bundle,
            app_index,
            count = uris.len(),
            "grant uri permission"
        );

        if !self.identity.is_sa_or_system_app_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "not sa or system app");
            return Err(UpmsError::NotSystemApp);
        }
        self.check_called_by_sandbox(ctx)?;
        self.check_batch_size(uris.len(), self.config.max_uri_count)?;
        check_flag(flag)?;

        let target = self.identity.resolve_token_id(target_bundle, app_index)?;

        let foundation = self.identity.is_foundation_call(ctx);
        let caller = if foundation || self.identity.is_udmf_or_pasteboard_call(ctx) {
            initiator
        } else {
            ctx.token_id
        };
        let ability_id = if foundation {
            ability_id
        } else {
            DEFAULT_ABILITY_ID
        };

        let parties = GrantParties {
            caller,
            target,
            target_bundle,
            ability_id,
        };
        let parsed: Vec<Uri> = uris.iter().map(|u| Uri::parse(u.as_str())).collect();
        self.grant_checked(ctx, &parsed, flag, &parties)
    }

    /// Grant URIs the caller does not itself hold. Requires
    /// `GRANT_URI_PERMISSION_PRIVILEGED`.
    ///
    /// URIs under the target's own authority need no record and count as
    /// granted.
    pub fn grant_uri_permission_privileged(
        &self,
        ctx: &CallingContext,
        uris: &[String],
        flag: UriFlags,
        target_bundle: &str,
        app_index: i32,
    ) -> Result<()> {
        tracing::info!(
            target_bundle,
            app_index,
            count = uris.len(),
            "grant uri permission privileged"
        );

        if !self
            .identity
            .verify_permission(ctx.token_id, permission::GRANT_URI_PERMISSION_PRIVILEGED)
        {
            tracing::error!(caller = %ctx.token_id, "no permission to call");
            return Err(UpmsError::CheckPermissionFailed);
        }
        self.check_batch_size(uris.len(), self.config.max_privileged_uri_count)?;
        check_flag(flag)?;

        let target = self.identity.resolve_token_id(target_bundle, app_index)?;
        let target_authority = self.identity.resolve_alterable_bundle_name(target);

        let mut valid = 0usize;
        let mut to_grant: Vec<Uri> = Vec::new();
        for raw in uris {
            let uri = Uri::parse(raw.as_str());
            if uri.class() == UriClass::Invalid {
                tracing::warn!(scheme = uri.scheme(), "invalid uri type");
                continue;
            }
            valid += 1;
            if uri.class() == UriClass::FileBundle
                && target_authority.as_deref() == Some(uri.authority())
            {
                tracing::debug!(uri = %uri, "uri owned by target, no grant needed");
                continue;
            }
            to_grant.push(uri);
        }

        if valid == 0 {
            tracing::error!("valid uri list is empty");
            return Err(UpmsError::InvalidUriType);
        }
        if to_grant.is_empty() {
            return Ok(());
        }

        let parties = GrantParties {
            caller: ctx.token_id,
            target,
            target_bundle,
            ability_id: DEFAULT_ABILITY_ID,
        };
        let refs: Vec<&Uri> = to_grant.iter().collect();
        self.dispatch_grant(&refs, flag, &parties, self.identity.is_system_app_call(ctx))
    }

    /// Grant the URIs published under a UDMF `key`, with the IPC caller as
    /// grantor.
    pub fn grant_uri_permission_by_key(
        &self,
        ctx: &CallingContext,
        key: &str,
        flag: UriFlags,
        target: TokenId,
    ) -> Result<()> {
        if !self.identity.is_system_app_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "not system app");
            return Err(UpmsError::NotSystemApp);
        }
        self.check_called_by_sandbox(ctx)?;
        self.grant_by_key_inner(ctx, key, flag, ctx.token_id, target)
    }

    /// Grant the URIs published under a UDMF `key` on behalf of `caller`.
    /// Requires `GRANT_URI_PERMISSION_AS_CALLER`.
    pub fn grant_uri_permission_by_key_as_caller(
        &self,
        ctx: &CallingContext,
        key: &str,
        flag: UriFlags,
        caller: TokenId,
        target: TokenId,
    ) -> Result<()> {
        if !self.identity.is_system_app_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "not system app");
            return Err(UpmsError::NotSystemApp);
        }
        if !self
            .identity
            .verify_permission(ctx.token_id, permission::GRANT_URI_PERMISSION_AS_CALLER)
        {
            tracing::error!(caller = %ctx.token_id, "no permission to grant as caller");
            return Err(UpmsError::CheckPermissionFailed);
        }
        self.check_called_by_sandbox(ctx)?;
        self.grant_by_key_inner(ctx, key, flag, caller, target)
    }

    fn grant_by_key_inner(
        &self,
        ctx: &CallingContext,
        key: &str,
        flag: UriFlags,
        caller: TokenId,
        target: TokenId,
    ) -> Result<()> {
        check_flag(flag)?;

        let Some(caller_user) = self.identity.resolve_user_id(caller) else {
            tracing::error!(caller = %caller, "caller token is not an application");
            return Err(UpmsError::InvalidCallerTokenId);
        };
        let Some(target_user) = self.identity.resolve_user_id(target) else {
            tracing::error!(target_token = %target, "target token is not an application");
            return Err(UpmsError::InvalidTargetTokenId);
        };
        if caller == target || caller_user != target_user {
            tracing::error!(
                caller = %caller,
                target_token = %target,
                caller_user,
                target_user,
                "key grant across identities rejected"
            );
            return Err(UpmsError::InvalidTargetTokenId);
        }

        let uris = self.platform.udmf.uris_by_key(key).map_err(|e| {
            tracing::error!(error = %e, "resolve udmf key failed");
            UpmsError::from(e)
        })?;
        self.check_batch_size(uris.len(), self.config.max_uri_count)?;

        let target_bundle = self.identity.resolve_bundle_name(target).unwrap_or_default();
        let parties = GrantParties {
            caller,
            target,
            target_bundle: &target_bundle,
            ability_id: DEFAULT_ABILITY_ID,
        };
        let parsed: Vec<Uri> = uris.into_iter().map(|u| Uri::parse(u)).collect();
        self.grant_checked(ctx, &parsed, flag, &parties)
    }

    fn check_batch_size(&self, len: usize, max: usize) -> Result<()> {
        if len == 0 || len > max {
            tracing::error!(len, max, "uri list out of range");
            return Err(UpmsError::UriListOutOfRange);
        }
        Ok(())
    }

    /// Standing filter followed by dispatch.
    fn grant_checked(
        &self,
        ctx: &CallingContext,
        uris: &[Uri],
        flag: UriFlags,
        parties: &GrantParties<'_>,
    ) -> Result<()> {
        let valid: Vec<&Uri> = uris
            .iter()
            .filter(|uri| {
                let ok = uri.class() != UriClass::Invalid;
                if !ok {
                    tracing::warn!(scheme = uri.scheme(), "invalid uri type");
                }
                ok
            })
            .collect();
        if valid.is_empty() {
            tracing::error!("valid uri list is empty");
            return Err(UpmsError::InvalidUriType);
        }

        let standing = self.check_standing(ctx, &valid, flag, parties.caller);
        let permitted: Vec<&Uri> = valid
            .iter()
            .zip(&standing)
            .filter_map(|(uri, ok)| ok.then_some(*uri))
            .collect();

        if permitted.len() < valid.len() {
            tracing::warn!(
                caller = %parties.caller,
                dropped = valid.len() - permitted.len(),
                "no permission on some uris"
            );
            self.report_unprivileged_share(parties.caller, parties.target);
        }
        if permitted.is_empty() {
            return Err(UpmsError::CheckPermissionFailed);
        }

        let caller_is_system_app = self.identity.is_system_app_token(parties.caller);
        self.dispatch_grant(&permitted, flag, parties, caller_is_system_app)
    }

    /// Hand each backend its partition. Succeeds if any backend granted.
    fn dispatch_grant(
        &self,
        uris: &[&Uri],
        flag: UriFlags,
        parties: &GrantParties<'_>,
        caller_is_system_app: bool,
    ) -> Result<()> {
        let mut granted: Vec<String> = Vec::new();

        for (idx, positions) in self.partition(uris) {
            let backend = self.backend_at(idx);
            let batch_uris: Vec<String> = positions
                .iter()
                .map(|&pos| uris[pos].as_str().to_string())
                .collect();
            let batch = GrantBatch {
                uris: &batch_uris,
                flag,
                caller: parties.caller,
                target: parties.target,
                target_bundle: parties.target_bundle,
                ability_id: parties.ability_id,
                caller_is_system_app,
            };
            match backend.grant(&batch) {
                Ok(uris) => granted.extend(uris),
                Err(e) => {
                    tracing::warn!(backend = backend.name(), error = %e, "backend grant failed");
                }
            }
        }

        if granted.is_empty() {
            return Err(UpmsError::InnerError);
        }
        self.report_grant(parties.caller, parties.target, &granted);
        Ok(())
    }
}

fn check_flag(flag: UriFlags) -> Result<()> {
    if !flag.is_valid() {
        tracing::error!(flag = flag.bits(), "invalid flag");
        return Err(UpmsError::InvalidUriFlag);
    }
    Ok(())
}
