//! Proxy Connection Manager.
//!
//! Remote service handles are resolved lazily through the
//! [`SystemAbilityManager`], cached, and death-watched. When a remote dies
//! its cache slot is cleared and nothing else; the next caller re-resolves.
//! A failed lookup is not retried in the background.
//!
//! Each cache slot has its own mutex. Resolution may block on the system
//! ability manager, so callers must never connect while holding the ledger
//! lock.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::{ProxyError, Result};
use crate::services::{
    AppManager, BundleManager, Collaborator, DeathRecipient, MediaPermissionManager, Remote,
    StorageManager,
};

/// Identity of a downstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    StorageManager,
    AppManager,
    BundleManager,
    MediaPermissionManager,
    Collaborator,
}

impl ServiceId {
    pub const fn name(&self) -> &'static str {
        match self {
            ServiceId::StorageManager => "storage_manager",
            ServiceId::AppManager => "app_manager",
            ServiceId::BundleManager => "bundle_manager",
            ServiceId::MediaPermissionManager => "media_permission_manager",
            ServiceId::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry of running system services.
///
/// Each getter returns `None` when the service is not running.
pub trait SystemAbilityManager: Send + Sync {
    fn storage_manager(&self) -> Option<Arc<dyn StorageManager>>;
    fn app_manager(&self) -> Option<Arc<dyn AppManager>>;
    fn bundle_manager(&self) -> Option<Arc<dyn BundleManager>>;
    fn media_permission_manager(&self) -> Option<Arc<dyn MediaPermissionManager>>;
}

type Resolver<T> = Box<dyn Fn() -> Option<Arc<T>> + Send + Sync>;

struct Slot<T: ?Sized> {
    proxy: Option<Arc<T>>,
    /// Bumped on every successful resolution so a late death notice for an
    /// old handle cannot clear a newer one.
    generation: u64,
}

/// A lazily-resolved, death-watched handle to one remote service.
pub struct ProxyCache<T: ?Sized> {
    service: ServiceId,
    slot: Mutex<Slot<T>>,
    resolver: Resolver<T>,
}

impl<T: ?Sized + Remote + 'static> ProxyCache<T> {
    /// Create an empty cache for `service`.
    pub fn new<F>(service: ServiceId, resolver: F) -> Arc<Self>
    where
        F: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
    {
        Arc::new(Self {
            service,
            slot: Mutex::new(Slot {
                proxy: None,
                generation: 0,
            }),
            resolver: Box::new(resolver),
        })
    }

    /// Return the cached handle, resolving it first if needed.
    pub fn connect(self: &Arc<Self>) -> Option<Arc<T>> {
        let mut slot = self.slot.lock();
        if let Some(proxy) = &slot.proxy {
            return Some(Arc::clone(proxy));
        }

        let Some(proxy) = (self.resolver)() else {
            tracing::error!(service = %self.service, "failed to resolve service");
            return None;
        };

        slot.generation += 1;
        let watch: Arc<dyn DeathRecipient> = Arc::new(DeathWatch {
            cache: Arc::downgrade(self),
            generation: slot.generation,
        });
        if !proxy.add_death_recipient(watch) {
            tracing::warn!(service = %self.service, "add death recipient failed");
        }

        tracing::debug!(service = %self.service, generation = slot.generation, "connected");
        slot.proxy = Some(Arc::clone(&proxy));
        Some(proxy)
    }

    /// Like [`connect`](Self::connect), mapping absence to an error.
    pub fn get(self: &Arc<Self>) -> Result<Arc<T>> {
        self.connect().ok_or(ProxyError::Unavailable(self.service))
    }

    /// True if a handle is currently cached.
    pub fn is_connected(&self) -> bool {
        self.slot.lock().proxy.is_some()
    }

    fn on_died(&self, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation == generation && slot.proxy.is_some() {
            tracing::info!(service = %self.service, "remote died, clearing proxy");
            slot.proxy = None;
        }
    }
}

struct DeathWatch<T: ?Sized> {
    cache: Weak<ProxyCache<T>>,
    generation: u64,
}

impl<T: ?Sized + Remote + 'static> DeathRecipient for DeathWatch<T> {
    fn on_remote_died(&self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.on_died(self.generation);
        }
    }
}

/// Cached handles to every downstream service.
pub struct ConnectionManager {
    storage: Arc<ProxyCache<dyn StorageManager>>,
    app: Arc<ProxyCache<dyn AppManager>>,
    bundle: Arc<ProxyCache<dyn BundleManager>>,
    media: Arc<ProxyCache<dyn MediaPermissionManager>>,
    collaborator: RwLock<Option<Arc<dyn Collaborator>>>,
}

impl ConnectionManager {
    /// Build a manager resolving through `sam`. Nothing is connected yet.
    pub fn new(sam: Arc<dyn SystemAbilityManager>) -> Self {
        let storage = {
            let sam = Arc::clone(&sam);
            ProxyCache::new(ServiceId::StorageManager, move || sam.storage_manager())
        };
        let app = {
            let sam = Arc::clone(&sam);
            ProxyCache::new(ServiceId::AppManager, move || sam.app_manager())
        };
        let bundle = {
            let sam = Arc::clone(&sam);
            ProxyCache::new(ServiceId::BundleManager, move || sam.bundle_manager())
        };
        let media = ProxyCache::new(ServiceId::MediaPermissionManager, move || {
            sam.media_permission_manager()
        });

        Self {
            storage,
            app,
            bundle,
            media,
            collaborator: RwLock::new(None),
        }
    }

    pub fn storage_manager(&self) -> Result<Arc<dyn StorageManager>> {
        self.storage.get()
    }

    pub fn app_manager(&self) -> Result<Arc<dyn AppManager>> {
        self.app.get()
    }

    pub fn bundle_manager(&self) -> Result<Arc<dyn BundleManager>> {
        self.bundle.get()
    }

    pub fn media_permission_manager(&self) -> Result<Arc<dyn MediaPermissionManager>> {
        self.media.get()
    }

    /// The registered collaborator, if any.
    pub fn collaborator(&self) -> Result<Arc<dyn Collaborator>> {
        self.collaborator
            .read()
            .clone()
            .ok_or(ProxyError::Unavailable(ServiceId::Collaborator))
    }

    /// Install the content-URI collaborator, replacing any previous one.
    pub fn register_collaborator(&self, collaborator: Arc<dyn Collaborator>) {
        tracing::info!("collaborator registered");
        *self.collaborator.write() = Some(collaborator);
    }

    /// Remove the collaborator.
    pub fn unregister_collaborator(&self) {
        tracing::info!("collaborator unregistered");
        *self.collaborator.write() = None;
    }

    /// True if the named service currently has a cached handle.
    pub fn is_connected(&self, service: ServiceId) -> bool {
        match service {
            ServiceId::StorageManager => self.storage.is_connected(),
            ServiceId::AppManager => self.app.is_connected(),
            ServiceId::BundleManager => self.bundle.is_connected(),
            ServiceId::MediaPermissionManager => self.media.is_connected(),
            ServiceId::Collaborator => self.collaborator.read().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use upms_core::{TokenId, UriFlags};

    use crate::services::ShareFileStatus;

    #[derive(Default)]
    struct FakeStorage {
        recipients: Mutex<Vec<Arc<dyn DeathRecipient>>>,
    }

    impl FakeStorage {
        fn die(&self) {
            let recipients = std::mem::take(&mut *self.recipients.lock());
            for r in recipients {
                r.on_remote_died();
            }
        }
    }

    impl Remote for FakeStorage {
        fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
            self.recipients.lock().push(recipient);
            true
        }
    }

    impl StorageManager for FakeStorage {
        fn create_share_file(
            &self,
            uris: &[String],
            _target: TokenId,
            _flag: UriFlags,
        ) -> Result<Vec<ShareFileStatus>> {
            Ok(vec![ShareFileStatus::Created; uris.len()])
        }

        fn delete_share_file(&self, _target: TokenId, _uris: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn counting_cache(
        current: Arc<Mutex<Option<Arc<FakeStorage>>>>,
        lookups: Arc<AtomicUsize>,
    ) -> Arc<ProxyCache<dyn StorageManager>> {
        ProxyCache::new(ServiceId::StorageManager, move || {
            lookups.fetch_add(1, Ordering::SeqCst);
            current
                .lock()
                .clone()
                .map(|s| s as Arc<dyn StorageManager>)
        })
    }

    #[test]
    fn test_connect_is_cached() {
        let current = Arc::new(Mutex::new(Some(Arc::new(FakeStorage::default()))));
        let lookups = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&current), Arc::clone(&lookups));

        assert!(cache.connect().is_some());
        assert!(cache.connect().is_some());
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_absent_service_is_not_cached() {
        let current = Arc::new(Mutex::new(None));
        let lookups = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&current), Arc::clone(&lookups));

        assert!(cache.connect().is_none());
        assert_eq!(
            cache.get().err(),
            Some(ProxyError::Unavailable(ServiceId::StorageManager))
        );
        assert_eq!(lookups.load(Ordering::SeqCst), 2);

        *current.lock() = Some(Arc::new(FakeStorage::default()));
        assert!(cache.connect().is_some());
    }

    #[test]
    fn test_death_clears_and_reconnects() {
        let first = Arc::new(FakeStorage::default());
        let current = Arc::new(Mutex::new(Some(Arc::clone(&first))));
        let lookups = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&current), Arc::clone(&lookups));

        cache.connect();
        assert!(cache.is_connected());

        first.die();
        assert!(!cache.is_connected());

        *current.lock() = Some(Arc::new(FakeStorage::default()));
        assert!(cache.connect().is_some());
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_death_keeps_new_handle() {
        let first = Arc::new(FakeStorage::default());
        let current = Arc::new(Mutex::new(Some(Arc::clone(&first))));
        let lookups = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&current), Arc::clone(&lookups));

        cache.connect();
        let stale = std::mem::take(&mut *first.recipients.lock());

        first.die();
        cache.on_died(1);
        *current.lock() = Some(Arc::new(FakeStorage::default()));
        cache.connect();

        for r in stale {
            r.on_remote_died();
        }
        assert!(cache.is_connected());
    }
}
