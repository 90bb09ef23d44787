//! In-memory fakes of every downstream service.
//!
//! [`FakePlatform`] is the single entry point: it owns an app registry, the
//! fake remote services, and the in-process libraries, and hands out a
//! [`Platform`] wired to all of them. Failures are scripted per service.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use upms_core::{uid, CallingContext, TokenId, UriFlags};
use upms_proxy::{
    AccessTokenKit, AppManager, BundleManager, Collaborator, DeathRecipient, EventReporter,
    GrantEvent, HapTokenInfo, MediaPermissionManager, Platform, PolicyInfo, PolicyManager,
    ProxyError, Remote, Result, ShareFileStatus, StorageManager, SystemAbilityManager, TokenType,
    UdmfKeyResolver,
};

/// User id every fake app is installed under unless stated otherwise.
pub const DEFAULT_USER_ID: i32 = 100;

const APP_UID_BASE: i32 = 20_010_000;

/// One installed application or native process.
#[derive(Debug, Clone)]
pub struct FakeApp {
    pub token: TokenId,
    pub bundle_name: String,
    pub app_index: i32,
    pub user_id: i32,
    pub token_type: TokenType,
    pub system_app: bool,
    pub pid: i32,
    pub uid: i32,
}

impl FakeApp {
    /// Authority of the app's own file URIs.
    pub fn alterable_name(&self) -> String {
        alterable_name(&self.bundle_name, self.app_index)
    }

    /// An IPC context as if this app were calling.
    pub fn ctx(&self) -> CallingContext {
        CallingContext::new(self.token, self.pid, self.uid)
    }

    /// A file URI under this app's own authority.
    pub fn file_uri(&self, path: &str) -> String {
        format!("file://{}/{}", self.alterable_name(), path.trim_start_matches('/'))
    }
}

fn alterable_name(bundle_name: &str, app_index: i32) -> String {
    if app_index == 0 {
        bundle_name.to_string()
    } else {
        format!("+clone-{app_index}+{bundle_name}")
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Remote liveness
// ───────────────────────────────────────────────────────────────────────────

/// Death-recipient bookkeeping shared by the fake remotes.
#[derive(Default)]
pub struct FakeRemote {
    recipients: Mutex<Vec<Arc<dyn DeathRecipient>>>,
}

impl FakeRemote {
    /// Notify and forget every registered recipient.
    pub fn die(&self) {
        let recipients = std::mem::take(&mut *self.recipients.lock());
        for recipient in recipients {
            recipient.on_remote_died();
        }
    }

    fn add(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
        self.recipients.lock().push(recipient);
        true
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Storage manager
// ───────────────────────────────────────────────────────────────────────────

/// Share files kept as a `(grantee, uri)` set.
#[derive(Default)]
pub struct FakeStorageManager {
    remote: FakeRemote,
    share_files: Mutex<BTreeSet<(TokenId, String)>>,
    failing_uris: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    fail_delete: AtomicBool,
    delete_calls: Mutex<Vec<(TokenId, Vec<String>)>>,
    calls: AtomicUsize,
}

impl FakeStorageManager {
    /// Make share-file creation fail for `uri`.
    pub fn fail_uri(&self, uri: &str) {
        self.failing_uris.lock().insert(uri.to_string());
    }

    /// Make every create call fail as a whole.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Make every delete call fail.
    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn has_share_file(&self, target: TokenId, uri: &str) -> bool {
        self.share_files.lock().contains(&(target, uri.to_string()))
    }

    pub fn share_file_count(&self) -> usize {
        self.share_files.lock().len()
    }

    /// Every delete call, in order.
    pub fn delete_calls(&self) -> Vec<(TokenId, Vec<String>)> {
        self.delete_calls.lock().clone()
    }

    /// Number of create and delete calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn die(&self) {
        self.remote.die();
    }
}

impl Remote for FakeStorageManager {
    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
        self.remote.add(recipient)
    }
}

impl StorageManager for FakeStorageManager {
    fn create_share_file(
        &self,
        uris: &[String],
        target: TokenId,
        _flag: UriFlags,
    ) -> Result<Vec<ShareFileStatus>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ProxyError::CallFailed(-1));
        }
        let failing = self.failing_uris.lock().clone();
        let mut files = self.share_files.lock();
        let statuses = uris
            .iter()
            .map(|uri| {
                if failing.contains(uri) {
                    ShareFileStatus::Failed(-13)
                } else if files.insert((target, uri.clone())) {
                    ShareFileStatus::Created
                } else {
                    ShareFileStatus::AlreadyExists
                }
            })
            .collect();
        Ok(statuses)
    }

    fn delete_share_file(&self, target: TokenId, uris: &[String]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.delete_calls.lock().push((target, uris.to_vec()));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ProxyError::CallFailed(-1));
        }
        let mut files = self.share_files.lock();
        for uri in uris {
            files.remove(&(target, uri.clone()));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────────────────
// App and bundle managers
// ───────────────────────────────────────────────────────────────────────────

/// Sandbox classification by pid.
#[derive(Default)]
pub struct FakeAppManager {
    remote: FakeRemote,
    sandboxed: Mutex<HashSet<i32>>,
    fail: AtomicBool,
}

impl FakeAppManager {
    pub fn set_sandboxed(&self, pid: i32) {
        self.sandboxed.lock().insert(pid);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Remote for FakeAppManager {
    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
        self.remote.add(recipient)
    }
}

impl AppManager for FakeAppManager {
    fn judge_sandbox_by_pid(&self, pid: i32) -> Result<bool> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProxyError::CallFailed(-1));
        }
        Ok(self.sandboxed.lock().contains(&pid))
    }
}

/// Bundle queries answered from the shared app registry.
pub struct FakeBundleManager {
    remote: FakeRemote,
    registry: Arc<Registry>,
}

impl Remote for FakeBundleManager {
    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
        self.remote.add(recipient)
    }
}

impl BundleManager for FakeBundleManager {
    fn application_token_id(
        &self,
        bundle_name: &str,
        app_index: i32,
        user_id: i32,
    ) -> Result<Option<TokenId>> {
        Ok(self
            .registry
            .find(|app| {
                app.token_type == TokenType::Hap
                    && app.bundle_name == bundle_name
                    && app.app_index == app_index
                    && app.user_id == user_id
            })
            .map(|app| app.token))
    }

    fn dir_by_bundle_and_app_index(&self, bundle_name: &str, app_index: i32) -> Result<String> {
        Ok(alterable_name(bundle_name, app_index))
    }

    fn is_system_app_bundle(&self, bundle_name: &str, user_id: i32) -> Result<bool> {
        Ok(self
            .registry
            .find(|app| app.bundle_name == bundle_name && app.user_id == user_id)
            .map(|app| app.system_app)
            .unwrap_or(false))
    }

    fn current_user_id(&self) -> i32 {
        DEFAULT_USER_ID
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Media and content
// ───────────────────────────────────────────────────────────────────────────

/// Media grants kept as a `(grantee, uri) -> flag` map.
#[derive(Default)]
pub struct FakeMediaPermissionManager {
    remote: FakeRemote,
    grants: Mutex<BTreeMap<(TokenId, String), UriFlags>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeMediaPermissionManager {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn has_grant(&self, target: TokenId, uri: &str) -> bool {
        self.grants.lock().contains_key(&(target, uri.to_string()))
    }

    /// Seed a grant as if it had been made earlier.
    pub fn seed(&self, target: TokenId, uri: &str, flag: UriFlags) {
        self.grants.lock().insert((target, uri.to_string()), flag);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Remote for FakeMediaPermissionManager {
    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
        self.remote.add(recipient)
    }
}

impl MediaPermissionManager for FakeMediaPermissionManager {
    fn grant_uri_permission(
        &self,
        uris: &[String],
        flag: UriFlags,
        _caller: TokenId,
        target: TokenId,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProxyError::CallFailed(-1));
        }
        let mut grants = self.grants.lock();
        for uri in uris {
            *grants.entry((target, uri.clone())).or_default() |= flag;
        }
        Ok(())
    }

    fn check_uri_permission(&self, uris: &[String], flag: UriFlags, token: TokenId) -> Vec<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let grants = self.grants.lock();
        uris.iter()
            .map(|uri| {
                grants
                    .get(&(token, uri.clone()))
                    .map(|held| UriFlags::satisfies(*held, flag.required_bit()))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn revoke_uri_permission(&self, _caller: TokenId, target: TokenId, uri: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.grants.lock().remove(&(target, uri.to_string()));
        Ok(())
    }
}

/// Content grants kept per token.
#[derive(Default)]
pub struct FakeCollaborator {
    grants: Mutex<BTreeMap<TokenId, BTreeSet<String>>>,
    authorized: Mutex<HashSet<(TokenId, String)>>,
    revoked: Mutex<Vec<TokenId>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeCollaborator {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Let `token` pass the collaborator's own check for `uri`.
    pub fn authorize(&self, token: TokenId, uri: &str) {
        self.authorized.lock().insert((token, uri.to_string()));
    }

    pub fn granted(&self, target: TokenId) -> BTreeSet<String> {
        self.grants.lock().get(&target).cloned().unwrap_or_default()
    }

    pub fn revoked(&self) -> Vec<TokenId> {
        self.revoked.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Collaborator for FakeCollaborator {
    fn grant_uri_permission(
        &self,
        uris: &[String],
        _flag: UriFlags,
        target: TokenId,
        _target_bundle: &str,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProxyError::CallFailed(-1));
        }
        self.grants
            .lock()
            .entry(target)
            .or_default()
            .extend(uris.iter().cloned());
        Ok(())
    }

    fn revoke_uri_permission(&self, target: TokenId) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.grants.lock().remove(&target);
        self.revoked.lock().push(target);
        Ok(())
    }

    fn check_uri_authorization(
        &self,
        uris: &[String],
        _flag: UriFlags,
        token: TokenId,
    ) -> Vec<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let authorized = self.authorized.lock();
        uris.iter()
            .map(|uri| authorized.contains(&(token, uri.clone())))
            .collect()
    }
}

// ───────────────────────────────────────────────────────────────────────────
// In-process libraries
// ───────────────────────────────────────────────────────────────────────────

/// Recorded policy-manager calls.
#[derive(Default)]
pub struct FakePolicyManager {
    policies: Mutex<BTreeMap<TokenId, Vec<PolicyInfo>>>,
    persisted: Mutex<BTreeMap<TokenId, Vec<PolicyInfo>>>,
    unset: Mutex<Vec<TokenId>>,
    denied_paths: Mutex<HashSet<String>>,
}

impl FakePolicyManager {
    /// Refuse persistence for `path`.
    pub fn deny_path(&self, path: &str) {
        self.denied_paths.lock().insert(path.to_string());
    }

    pub fn policies(&self, token: TokenId) -> Vec<PolicyInfo> {
        self.policies.lock().get(&token).cloned().unwrap_or_default()
    }

    pub fn persisted(&self, token: TokenId) -> Vec<PolicyInfo> {
        self.persisted.lock().get(&token).cloned().unwrap_or_default()
    }

    pub fn unset_tokens(&self) -> Vec<TokenId> {
        self.unset.lock().clone()
    }
}

impl PolicyManager for FakePolicyManager {
    fn check_persist_policy(&self, _target: TokenId, policies: &[PolicyInfo]) -> Vec<bool> {
        let denied = self.denied_paths.lock();
        policies.iter().map(|p| !denied.contains(&p.path)).collect()
    }

    fn set_policy(&self, target: TokenId, policies: &[PolicyInfo], _persistable: bool) -> Result<()> {
        self.policies
            .lock()
            .entry(target)
            .or_default()
            .extend(policies.iter().cloned());
        Ok(())
    }

    fn persist_policy(&self, target: TokenId, policies: &[PolicyInfo]) -> Result<()> {
        self.persisted
            .lock()
            .entry(target)
            .or_default()
            .extend(policies.iter().cloned());
        Ok(())
    }

    fn unset_all_policy_by_token(&self, token: TokenId) -> Result<()> {
        self.policies.lock().remove(&token);
        self.unset.lock().push(token);
        Ok(())
    }
}

/// App registry plus per-token permissions.
#[derive(Default)]
pub struct Registry {
    apps: Mutex<Vec<FakeApp>>,
    permissions: Mutex<HashMap<TokenId, HashSet<String>>>,
}

impl Registry {
    fn find(&self, pred: impl Fn(&FakeApp) -> bool) -> Option<FakeApp> {
        self.apps.lock().iter().find(|app| pred(app)).cloned()
    }

    fn by_token(&self, token: TokenId) -> Option<FakeApp> {
        self.find(|app| app.token == token)
    }
}

impl AccessTokenKit for Registry {
    fn token_type(&self, token: TokenId) -> TokenType {
        self.by_token(token)
            .map(|app| app.token_type)
            .unwrap_or(TokenType::Invalid)
    }

    fn hap_token_info(&self, token: TokenId) -> Option<HapTokenInfo> {
        self.by_token(token)
            .filter(|app| app.token_type == TokenType::Hap)
            .map(|app| HapTokenInfo {
                bundle_name: app.bundle_name,
                inst_index: app.app_index,
                user_id: app.user_id,
            })
    }

    fn verify_permission(&self, token: TokenId, permission: &str) -> bool {
        self.permissions
            .lock()
            .get(&token)
            .map(|set| set.contains(permission))
            .unwrap_or(false)
    }

    fn is_system_app(&self, token: TokenId) -> bool {
        self.by_token(token)
            .map(|app| app.system_app)
            .unwrap_or(false)
    }
}

/// UDMF keys published in memory.
#[derive(Default)]
pub struct FakeUdmf {
    keys: Mutex<HashMap<String, Vec<String>>>,
}

impl UdmfKeyResolver for FakeUdmf {
    fn uris_by_key(&self, key: &str) -> Result<Vec<String>> {
        self.keys
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ProxyError::MalformedReply(format!("unknown key {key}")))
    }
}

/// Collected audit events.
#[derive(Default)]
pub struct FakeEventSink {
    events: Mutex<Vec<GrantEvent>>,
}

impl EventReporter for FakeEventSink {
    fn report(&self, event: GrantEvent) {
        self.events.lock().push(event);
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Platform
// ───────────────────────────────────────────────────────────────────────────

/// Every fake service, wired together.
pub struct FakePlatform {
    pub registry: Arc<Registry>,
    pub storage: Arc<FakeStorageManager>,
    pub app_manager: Arc<FakeAppManager>,
    pub bundle_manager: Arc<FakeBundleManager>,
    pub media: Arc<FakeMediaPermissionManager>,
    pub collaborator: Arc<FakeCollaborator>,
    pub policy: Arc<FakePolicyManager>,
    pub udmf: Arc<FakeUdmf>,
    pub events: Arc<FakeEventSink>,
    available: Mutex<HashSet<&'static str>>,
    lookups: AtomicUsize,
    next_token: AtomicU32,
}

impl FakePlatform {
    /// A platform with every remote service running and no apps.
    pub fn new() -> Arc<Self> {
        let registry = Arc::new(Registry::default());
        let available = ["storage", "app", "bundle", "media"].into_iter().collect();
        Arc::new(Self {
            registry: Arc::clone(&registry),
            storage: Arc::default(),
            app_manager: Arc::default(),
            bundle_manager: Arc::new(FakeBundleManager {
                remote: FakeRemote::default(),
                registry,
            }),
            media: Arc::default(),
            collaborator: Arc::default(),
            policy: Arc::default(),
            udmf: Arc::default(),
            events: Arc::default(),
            available: Mutex::new(available),
            lookups: AtomicUsize::new(0),
            next_token: AtomicU32::new(0x2800_0000),
        })
    }

    /// A [`Platform`] backed by these fakes.
    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            system_abilities: Arc::clone(self) as Arc<dyn SystemAbilityManager>,
            token_kit: Arc::clone(&self.registry) as Arc<dyn AccessTokenKit>,
            policy: Arc::clone(&self.policy) as Arc<dyn PolicyManager>,
            udmf: Arc::clone(&self.udmf) as Arc<dyn UdmfKeyResolver>,
            events: Arc::clone(&self.events) as Arc<dyn EventReporter>,
        }
    }

    fn next_token(&self) -> TokenId {
        TokenId(self.next_token.fetch_add(1, Ordering::SeqCst))
    }

    fn register(&self, app: FakeApp) -> FakeApp {
        self.registry.apps.lock().push(app.clone());
        app
    }

    /// Install a third-party app.
    pub fn install_app(&self, bundle_name: &str, app_index: i32) -> FakeApp {
        self.install(bundle_name, app_index, DEFAULT_USER_ID, false)
    }

    /// Install a system app.
    pub fn install_system_app(&self, bundle_name: &str) -> FakeApp {
        self.install(bundle_name, 0, DEFAULT_USER_ID, true)
    }

    /// Install an app under a specific user.
    pub fn install(&self, bundle_name: &str, app_index: i32, user_id: i32, system_app: bool) -> FakeApp {
        let token = self.next_token();
        let n = (token.get() & 0xffff) as i32;
        self.register(FakeApp {
            token,
            bundle_name: bundle_name.to_string(),
            app_index,
            user_id,
            token_type: TokenType::Hap,
            system_app,
            pid: 1000 + n,
            uid: APP_UID_BASE + n,
        })
    }

    /// Register a native process calling with `uid`.
    pub fn add_native(&self, name: &str, uid: i32) -> FakeApp {
        let token = self.next_token();
        let n = (token.get() & 0xffff) as i32;
        self.register(FakeApp {
            token,
            bundle_name: name.to_string(),
            app_index: 0,
            user_id: 0,
            token_type: TokenType::Native,
            system_app: false,
            pid: 100 + n,
            uid,
        })
    }

    /// The foundation process.
    pub fn foundation(&self) -> FakeApp {
        self.add_native("foundation", uid::FOUNDATION)
    }

    /// Give `token` a named permission.
    pub fn grant_permission(&self, token: TokenId, permission: &str) {
        self.registry
            .permissions
            .lock()
            .entry(token)
            .or_default()
            .insert(permission.to_string());
    }

    /// Publish URIs under a UDMF key.
    pub fn publish_key(&self, key: &str, uris: &[String]) {
        self.udmf.keys.lock().insert(key.to_string(), uris.to_vec());
    }

    /// Collected audit events.
    pub fn events(&self) -> Vec<GrantEvent> {
        self.events.events.lock().clone()
    }

    /// Stop or restart a remote service: `"storage"`, `"app"`, `"bundle"`
    /// or `"media"`.
    pub fn set_available(&self, service: &'static str, up: bool) {
        let mut available = self.available.lock();
        if up {
            available.insert(service);
        } else {
            available.remove(service);
        }
    }

    /// Number of system-ability lookups served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn lookup<T: ?Sized>(&self, service: &'static str, handle: Arc<T>) -> Option<Arc<T>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.available.lock().contains(service).then_some(handle)
    }
}

impl SystemAbilityManager for FakePlatform {
    fn storage_manager(&self) -> Option<Arc<dyn StorageManager>> {
        self.lookup("storage", Arc::clone(&self.storage) as Arc<dyn StorageManager>)
    }

    fn app_manager(&self) -> Option<Arc<dyn AppManager>> {
        self.lookup("app", Arc::clone(&self.app_manager) as Arc<dyn AppManager>)
    }

    fn bundle_manager(&self) -> Option<Arc<dyn BundleManager>> {
        self.lookup("bundle", Arc::clone(&self.bundle_manager) as Arc<dyn BundleManager>)
    }

    fn media_permission_manager(&self) -> Option<Arc<dyn MediaPermissionManager>> {
        self.lookup("media", Arc::clone(&self.media) as Arc<dyn MediaPermissionManager>)
    }
}
