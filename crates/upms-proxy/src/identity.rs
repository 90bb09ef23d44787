//! TokenIdentity Resolver.
//!
//! Maps token ids to bundle identities and answers caller-identity
//! predicates. Nothing is cached: every answer is fetched from the
//! access-token kit or the bundle manager at call time.

use std::sync::Arc;

use upms_core::{CallingContext, Result, TokenId, UpmsError};

use crate::connection::ConnectionManager;
use crate::services::{AccessTokenKit, TokenType};

/// Resolves token ids and evaluates caller-identity predicates.
#[derive(Clone)]
pub struct TokenIdentityResolver {
    token_kit: Arc<dyn AccessTokenKit>,
    connections: Arc<ConnectionManager>,
}

impl TokenIdentityResolver {
    pub fn new(token_kit: Arc<dyn AccessTokenKit>, connections: Arc<ConnectionManager>) -> Self {
        Self {
            token_kit,
            connections,
        }
    }

    /// Token id of the installed `(bundle_name, app_index)` for the current
    /// user.
    pub fn resolve_token_id(&self, bundle_name: &str, app_index: i32) -> Result<TokenId> {
        let bms = self.connections.bundle_manager().map_err(|e| {
            tracing::warn!(error = %e, "bundle manager unavailable");
            UpmsError::from(e)
        })?;
        let user_id = bms.current_user_id();
        match bms.application_token_id(bundle_name, app_index, user_id) {
            Ok(Some(token)) => Ok(token),
            Ok(None) => {
                tracing::warn!(bundle_name, app_index, "target bundle not installed");
                Err(UpmsError::TargetBundleNotExist)
            }
            Err(e) => {
                tracing::warn!(bundle_name, app_index, error = %e, "bundle lookup failed");
                Err(UpmsError::TargetBundleNotExist)
            }
        }
    }

    /// Canonical bundle name of an application token.
    pub fn resolve_bundle_name(&self, token: TokenId) -> Option<String> {
        if self.token_kit.token_type(token) != TokenType::Hap {
            return None;
        }
        self.token_kit.hap_token_info(token).map(|info| info.bundle_name)
    }

    /// The name an application's own file URIs carry as authority. Differs
    /// from the bundle name for clone and sandbox instances.
    pub fn resolve_alterable_bundle_name(&self, token: TokenId) -> Option<String> {
        if self.token_kit.token_type(token) != TokenType::Hap {
            return None;
        }
        let info = self.token_kit.hap_token_info(token)?;
        let bms = self.connections.bundle_manager().ok()?;
        match bms.dir_by_bundle_and_app_index(&info.bundle_name, info.inst_index) {
            Ok(dir) => Some(dir),
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "dir lookup failed");
                None
            }
        }
    }

    /// User id an application token runs under.
    pub fn resolve_user_id(&self, token: TokenId) -> Option<i32> {
        self.token_kit.hap_token_info(token).map(|info| info.user_id)
    }

    /// True if the installed bundle is a system app.
    pub fn is_system_app_bundle(&self, bundle_name: &str) -> bool {
        let Ok(bms) = self.connections.bundle_manager() else {
            return false;
        };
        let user_id = bms.current_user_id();
        bms.is_system_app_bundle(bundle_name, user_id).unwrap_or(false)
    }

    pub fn is_sa_or_system_app_call(&self, ctx: &CallingContext) -> bool {
        self.is_system_app_call(ctx) || self.token_kit.token_type(ctx.token_id) == TokenType::Native
    }

    pub fn is_system_app_call(&self, ctx: &CallingContext) -> bool {
        self.is_system_app_token(ctx.token_id)
    }

    pub fn is_system_app_token(&self, token: TokenId) -> bool {
        self.token_kit.is_system_app(token)
    }

    pub fn is_foundation_call(&self, ctx: &CallingContext) -> bool {
        ctx.is_foundation()
    }

    pub fn is_udmf_or_pasteboard_call(&self, ctx: &CallingContext) -> bool {
        ctx.is_udmf_or_pasteboard()
    }

    /// True if `token` holds the named permission.
    pub fn verify_permission(&self, token: TokenId, permission: &str) -> bool {
        self.token_kit.verify_permission(token, permission)
    }
}
