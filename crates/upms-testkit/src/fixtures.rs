//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use upms_core::{permission, Result, UriFlags, DEFAULT_ABILITY_ID};
use upms_engine::{EngineConfig, UriPermissionManager};
use upms_proxy::Collaborator;

use crate::fakes::{FakeApp, FakePlatform};

/// Bundle of the system file manager installed by [`TestFixture::new`].
pub const FILES_BUNDLE: &str = "com.example.filemanager";

/// Bundle of the third-party viewer installed by [`TestFixture::new`].
pub const VIEWER_BUNDLE: &str = "com.example.viewer";

/// A manager over fresh fakes with three identities installed.
pub struct TestFixture {
    pub platform: Arc<FakePlatform>,
    pub manager: UriPermissionManager,
    /// The foundation process.
    pub foundation: FakeApp,
    /// A system app that owns files and grants them.
    pub files_app: FakeApp,
    /// A third-party app that receives grants.
    pub viewer: FakeApp,
}

impl TestFixture {
    /// Create a fixture with the default engine configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a fixture with a custom engine configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let platform = FakePlatform::new();
        let manager = UriPermissionManager::new(config, platform.platform());
        manager.register_collaborator(Arc::clone(&platform.collaborator) as Arc<dyn Collaborator>);

        let foundation = platform.foundation();
        let files_app = platform.install_system_app(FILES_BUNDLE);
        let viewer = platform.install_app(VIEWER_BUNDLE, 0);

        Self {
            platform,
            manager,
            foundation,
            files_app,
            viewer,
        }
    }

    /// Install another third-party app.
    pub fn install(&self, bundle_name: &str) -> FakeApp {
        self.platform.install_app(bundle_name, 0)
    }

    /// Install a system app holding `permissions`.
    pub fn install_system_app_with(&self, bundle_name: &str, permissions: &[&str]) -> FakeApp {
        let app = self.platform.install_system_app(bundle_name);
        for p in permissions {
            self.platform.grant_permission(app.token, p);
        }
        app
    }

    /// `from` grants `uris` to `to` directly.
    pub fn grant(&self, from: &FakeApp, uris: &[String], flag: UriFlags, to: &FakeApp) -> Result<()> {
        self.manager.grant_uri_permission(
            &from.ctx(),
            uris,
            flag,
            &to.bundle_name,
            to.app_index,
            from.token,
            DEFAULT_ABILITY_ID,
        )
    }

    /// The foundation process grants on behalf of `initiator`, tied to
    /// `ability_id`.
    pub fn grant_for_ability(
        &self,
        initiator: &FakeApp,
        uris: &[String],
        flag: UriFlags,
        to: &FakeApp,
        ability_id: i32,
    ) -> Result<()> {
        self.manager.grant_uri_permission(
            &self.foundation.ctx(),
            uris,
            flag,
            &to.bundle_name,
            to.app_index,
            initiator.token,
            ability_id,
        )
    }

    /// Verify through the file manager's context.
    pub fn verify(&self, uri: &str, flag: UriFlags, holder: &FakeApp) -> bool {
        self.manager
            .verify_uri_permission(&self.files_app.ctx(), uri, flag, holder.token)
    }

    /// A system app holding `GRANT_URI_PERMISSION_PRIVILEGED`.
    pub fn privileged_app(&self) -> FakeApp {
        self.install_system_app_with(
            "com.example.privileged",
            &[permission::GRANT_URI_PERMISSION_PRIVILEGED],
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `n` third-party apps named `com.example.app<i>`.
pub fn installed_apps(fixture: &TestFixture, n: usize) -> Vec<FakeApp> {
    (0..n)
        .map(|i| fixture.install(&format!("com.example.app{i}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_identities() {
        let fx = TestFixture::new();
        assert!(fx.foundation.ctx().is_foundation());
        assert_ne!(fx.files_app.token, fx.viewer.token);
        assert!(fx.manager.identity().is_system_app_call(&fx.files_app.ctx()));
        assert!(!fx.manager.identity().is_system_app_call(&fx.viewer.ctx()));
    }

    #[test]
    fn test_installed_apps_are_distinct() {
        let fx = TestFixture::new();
        let apps = installed_apps(&fx, 3);
        assert_eq!(apps.len(), 3);
        assert_ne!(apps[0].token, apps[2].token);
        assert_eq!(
            fx.manager.identity().resolve_token_id("com.example.app1", 0),
            Ok(apps[1].token)
        );
    }

    #[test]
    fn test_basic_grant_then_verify() {
        let fx = TestFixture::new();
        let uri = fx.files_app.file_uri("a.txt");
        fx.grant(&fx.files_app, &[uri.clone()], UriFlags::READ, &fx.viewer)
            .unwrap();
        assert!(fx.verify(&uri, UriFlags::READ, &fx.viewer));
        assert!(!fx.verify(&uri, UriFlags::WRITE, &fx.viewer));
        assert!(fx.platform.storage.has_share_file(fx.viewer.token, &uri));
    }
}
