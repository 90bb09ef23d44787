//! The service object: one per process, owning the permission manager and
//! its ledger for the life of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use upms_core::{Result, UpmsError};
use upms_engine::UriPermissionManager;
use upms_proxy::{Collaborator, Platform};

use crate::config::ServiceConfig;

/// Lifecycle wrapper around [`UriPermissionManager`].
///
/// Requests are served only between [`init`](Self::init) and
/// [`stop`](Self::stop); outside that window [`manager`](Self::manager)
/// reports `ServiceNotReady`. Stopping keeps the manager, so grants made
/// before a restart can still be revoked after it.
pub struct UriPermissionService {
    config: ServiceConfig,
    manager: Arc<UriPermissionManager>,
    ready: AtomicBool,
}

impl UriPermissionService {
    /// Create a stopped service.
    pub fn new(config: ServiceConfig, platform: Platform) -> Self {
        let manager = UriPermissionManager::new(config.engine.clone(), platform);
        Self {
            config,
            manager: Arc::new(manager),
            ready: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Start serving. A second call is a no-op.
    pub fn init(&self) {
        if self.ready.swap(true, Ordering::AcqRel) {
            tracing::info!("uri permission service already initialized");
            return;
        }
        tracing::info!(
            records = self.manager.ledger().record_count(),
            "uri permission service ready"
        );
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Stop serving. The ledger is retained.
    pub fn stop(&self) {
        if self.ready.swap(false, Ordering::AcqRel) {
            tracing::info!("uri permission service stopped");
        }
    }

    /// The running manager.
    pub fn manager(&self) -> Result<Arc<UriPermissionManager>> {
        if !self.is_ready() {
            return Err(UpmsError::ServiceNotReady);
        }
        Ok(Arc::clone(&self.manager))
    }

    /// Install the content-URI collaborator.
    pub fn register_collaborator(&self, collaborator: Arc<dyn Collaborator>) {
        self.manager.register_collaborator(collaborator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upms_core::{UriFlags, DEFAULT_ABILITY_ID};
    use upms_testkit::fixtures::{FILES_BUNDLE, VIEWER_BUNDLE};
    use upms_testkit::FakePlatform;

    #[test]
    fn test_lifecycle() {
        let fakes = FakePlatform::new();
        let service = UriPermissionService::new(ServiceConfig::default(), fakes.platform());

        assert!(!service.is_ready());
        assert_eq!(service.manager().err(), Some(UpmsError::ServiceNotReady));

        service.init();
        assert!(service.is_ready());
        let first = service.manager().unwrap();
        service.init();
        assert!(Arc::ptr_eq(&first, &service.manager().unwrap()));

        service.stop();
        assert!(!service.is_ready());
        service.stop();

        service.init();
        assert!(Arc::ptr_eq(&first, &service.manager().unwrap()));
    }

    #[test]
    fn test_collaborator_survives_restart() {
        let fakes = FakePlatform::new();
        let service = UriPermissionService::new(ServiceConfig::default(), fakes.platform());
        service.register_collaborator(Arc::clone(&fakes.collaborator) as Arc<dyn Collaborator>);

        service.init();
        assert!(service.manager().unwrap().connections().collaborator().is_ok());

        service.stop();
        service.init();
        assert!(service.manager().unwrap().connections().collaborator().is_ok());
    }

    #[test]
    fn test_grants_revocable_after_restart() {
        let fakes = FakePlatform::new();
        let service = UriPermissionService::new(ServiceConfig::default(), fakes.platform());
        let files_app = fakes.install_system_app(FILES_BUNDLE);
        let viewer = fakes.install_app(VIEWER_BUNDLE, 0);
        let foundation = fakes.foundation();
        let uri = files_app.file_uri("a.txt");
        service.init();

        service
            .manager()
            .unwrap()
            .grant_uri_permission(
                &files_app.ctx(),
                &[uri.clone()],
                UriFlags::READ,
                VIEWER_BUNDLE,
                0,
                files_app.token,
                DEFAULT_ABILITY_ID,
            )
            .unwrap();
        assert!(fakes.storage.has_share_file(viewer.token, &uri));

        service.stop();
        service.init();
        let manager = service.manager().unwrap();
        assert_eq!(manager.ledger().record_count(), 1);

        manager
            .revoke_all_uri_permissions(&foundation.ctx(), viewer.token)
            .unwrap();
        assert!(!fakes.storage.has_share_file(viewer.token, &uri));
        assert_eq!(manager.ledger().record_count(), 0);
    }
}
