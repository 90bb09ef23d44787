//! # URI Permission Manager Engines
//!
//! Grant, verification and revocation over the grant ledger and the
//! downstream services.
//!
//! ## Overview
//!
//! [`UriPermissionManager`] is built once per process from an
//! [`EngineConfig`] and a [`Platform`](upms_proxy::Platform). It owns the
//! ledger and token indexes and routes every URI to a [`UriBackend`] by its
//! class:
//!
//! | Class                                | Backend          |
//! |--------------------------------------|------------------|
//! | `FileBundle`, `FileDocs`, `FileDocsCloud` | [`FileBackend`]  |
//! | `Media`                              | [`MediaBackend`] |
//! | `Content`                            | [`ContentBackend`] |
//!
//! ## Design Notes
//!
//! - **Partial batches succeed**: URIs the grantor has no standing on are
//!   dropped from a batch; only an empty remainder fails the call
//! - **Read is implicit**: any ledger record satisfies a READ check
//! - **Locks never span calls out**: ledger and index locks are released
//!   before any downstream service is contacted
//! - **Engines are synchronous**: each request runs on its own worker and
//!   blocks on downstream calls

pub mod backend;
pub mod config;
mod events;
mod grant;
pub mod manager;
mod revoke;
mod verify;

pub use backend::{
    ContentBackend, FileBackend, GrantBatch, MediaBackend, RevokeOne, Standing, UriBackend,
};
pub use config::EngineConfig;
pub use manager::UriPermissionManager;
