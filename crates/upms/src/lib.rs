//! # URI Permission Manager
//!
//! The process-wide authority that grants, verifies and revokes per-URI
//! access rights one application extends to another.
//!
//! ## Overview
//!
//! - [`UriPermissionService`]: owns the permission manager between `init`
//!   and `stop`
//! - [`UriPermissionStub`]: decodes requests, enforces wire limits, and
//!   dispatches to the engines
//! - [`server`]: a tokio accept loop running each request on its own
//!   blocking worker
//! - [`UriPermissionProxy`]: async client over any [`RpcTransport`]
//! - [`ServiceConfig`]: JSON-loadable configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use upms::{server, ServiceConfig, UriPermissionProxy, UriPermissionService, UriPermissionStub};
//! use upms::core::{CallingContext, TokenId, UriFlags};
//! # fn platform() -> upms::proxy::Platform { unimplemented!() }
//!
//! async fn example() {
//!     let service = Arc::new(UriPermissionService::new(ServiceConfig::default(), platform()));
//!     service.init();
//!
//!     let handle = server::spawn(Arc::new(UriPermissionStub::new(service)));
//!     let caller = CallingContext::new(TokenId(0x2800_0001), 1001, 20_010_001);
//!     let client = UriPermissionProxy::new(handle.transport(caller));
//!
//!     client
//!         .grant_uri_permission("file://com.example.files/a.txt", UriFlags::READ,
//!             "com.example.viewer", 0, caller.token_id, -1)
//!         .await
//!         .unwrap();
//!
//!     handle.shutdown().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `upms::core` - tokens, flags, records, URI classification, error codes
//! - `upms::ledger` - the grant ledger and token indexes
//! - `upms::proxy` - downstream service contracts and connections
//! - `upms::engine` - grant, verification and revocation engines

pub mod config;
pub mod error;
pub mod messages;
pub mod proxy_client;
pub mod server;
pub mod service;
pub mod stub;
pub mod transport;

// Re-export component crates
pub use upms_core as core;
pub use upms_engine as engine;
pub use upms_ledger as ledger;
pub use upms_proxy as proxy;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use messages::{Reply, ReplyBody, Request, RequestFrame, INTERFACE_DESCRIPTOR};
pub use proxy_client::UriPermissionProxy;
pub use server::ServerHandle;
pub use service::UriPermissionService;
pub use stub::UriPermissionStub;
pub use transport::{LocalTransport, RpcTransport};
