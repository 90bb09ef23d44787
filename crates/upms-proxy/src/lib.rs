//! # URI Permission Manager Proxies
//!
//! Everything the permission manager consumes from the rest of the system.
//!
//! ## Overview
//!
//! - [`services`] defines the contracts of the downstream services: the
//!   storage manager (share files), the app and bundle managers, the media
//!   permission manager, the pluggable content collaborator, the access-token
//!   kit, the sandbox policy manager, the UDMF key resolver and the audit
//!   event sink.
//! - [`ConnectionManager`] lazily resolves and death-watches remote handles.
//! - [`TokenIdentityResolver`] turns token ids into bundle identities and
//!   evaluates caller predicates.
//!
//! ## Design Notes
//!
//! - **Observer, not callback**: a dying remote notifies a registered
//!   [`DeathRecipient`] that holds only a weak reference to its cache slot
//! - **Degrade, don't crash**: an absent service surfaces as
//!   [`ProxyError::Unavailable`], which engines map to an error code

pub mod connection;
pub mod error;
pub mod identity;
pub mod services;

use std::sync::Arc;

pub use connection::{ConnectionManager, ProxyCache, ServiceId, SystemAbilityManager};
pub use error::{ProxyError, Result};
pub use identity::TokenIdentityResolver;
pub use services::{
    policy_mode, AccessTokenKit, AppManager, BundleManager, Collaborator, DeathRecipient,
    EventReporter, GrantEvent, HapTokenInfo, MediaPermissionManager, PolicyInfo, PolicyManager,
    Remote, ShareFileStatus, StorageManager, TokenType, UdmfKeyResolver,
};

/// Handles to every service the permission manager talks to.
#[derive(Clone)]
pub struct Platform {
    /// Registry the remote services are resolved from.
    pub system_abilities: Arc<dyn SystemAbilityManager>,

    /// Access-control subsystem.
    pub token_kit: Arc<dyn AccessTokenKit>,

    /// Sandbox path-policy manager.
    pub policy: Arc<dyn PolicyManager>,

    /// Drag-and-drop / clipboard key resolver.
    pub udmf: Arc<dyn UdmfKeyResolver>,

    /// Audit sink.
    pub events: Arc<dyn EventReporter>,
}
