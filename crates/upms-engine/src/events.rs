//! Audit events for the grant path. Reporting never fails a grant.

use upms_core::{TokenId, Uri};
use upms_proxy::GrantEvent;

use crate::manager::UriPermissionManager;

impl UriPermissionManager {
    /// A system app granted URIs to a non-system app.
    pub(crate) fn report_grant(&self, caller: TokenId, target: TokenId, granted: &[String]) {
        if !self.config.report_grant_events {
            return;
        }
        let Some(first) = granted.first() else {
            return;
        };
        let Some(caller_bundle) = self.identity.resolve_bundle_name(caller) else {
            tracing::debug!(caller = %caller, "caller has no bundle, skip grant event");
            return;
        };
        if !self.identity.is_system_app_bundle(&caller_bundle) {
            return;
        }
        let Some(target_bundle) = self.identity.resolve_bundle_name(target) else {
            return;
        };
        if self.identity.is_system_app_bundle(&target_bundle) {
            return;
        }

        self.platform.events.report(GrantEvent::GrantUriPermission {
            caller_bundle,
            target_bundle,
            uri: Uri::parse(first.as_str()).scheme_authority(),
        });
    }

    /// A grant dropped URIs the caller could not share.
    pub(crate) fn report_unprivileged_share(&self, caller: TokenId, target: TokenId) {
        if !self.config.report_grant_events {
            return;
        }
        let (Some(caller_bundle), Some(target_bundle)) = (
            self.identity.resolve_bundle_name(caller),
            self.identity.resolve_bundle_name(target),
        ) else {
            return;
        };
        tracing::debug!(%caller_bundle, %target_bundle, "share unprivileged uri");
        self.platform.events.report(GrantEvent::ShareUnprivilegedUri {
            caller_bundle,
            target_bundle,
        });
    }
}
