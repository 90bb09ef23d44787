//! Verification Engine.
//!
//! Both entry points fail closed: a rejected caller or malformed request
//! yields `false`, never an error.

use upms_core::{CallingContext, TokenId, Uri, UriFlags};

use crate::manager::UriPermissionManager;

impl UriPermissionManager {
    /// Does `token` hold `flag` on the file URI `uri`?
    ///
    /// Media and content URIs are not answered here.
    pub fn verify_uri_permission(
        &self,
        ctx: &CallingContext,
        uri: &str,
        flag: UriFlags,
        token: TokenId,
    ) -> bool {
        if !self.identity.is_sa_or_system_app_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "not sa or system app");
            return false;
        }
        if !flag.is_valid() {
            tracing::warn!(flag = flag.bits(), "invalid flag");
            return false;
        }
        self.verify_ledger(&Uri::parse(uri), flag, token)
    }

    /// Ledger lookup with the distributed subdirectory fallback.
    pub(crate) fn verify_ledger(&self, uri: &Uri, flag: UriFlags, token: TokenId) -> bool {
        if !uri.class().is_file() {
            tracing::debug!(scheme = uri.scheme(), authority = uri.authority(), "not a ledger uri");
            return false;
        }
        let granted = self.ledger.verify(uri.as_str(), token, flag);
        tracing::debug!(uri = %uri, token = %token, granted, "verify uri permission");
        granted
    }

    /// Batch authorization check. Always returns one answer per input URI.
    pub fn check_uri_authorization(
        &self,
        ctx: &CallingContext,
        uris: &[String],
        flag: UriFlags,
        token: TokenId,
    ) -> Vec<bool> {
        tracing::info!(token = %token, count = uris.len(), "check uri authorization");
        let denied = vec![false; uris.len()];

        if !self.identity.is_sa_or_system_app_call(ctx) {
            tracing::error!(caller = %ctx.token_id, "not sa or system app");
            return denied;
        }
        if !flag.is_valid() {
            tracing::warn!(flag = flag.bits(), "invalid flag");
            return denied;
        }
        if uris.len() > self.config.max_privileged_uri_count {
            tracing::error!(count = uris.len(), "uri list out of range");
            return denied;
        }

        let parsed: Vec<Uri> = uris.iter().map(|u| Uri::parse(u.as_str())).collect();
        let refs: Vec<&Uri> = parsed.iter().collect();
        self.check_standing(ctx, &refs, flag, token)
    }
}
