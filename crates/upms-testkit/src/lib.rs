//! # URI Permission Manager Testkit
//!
//! Testing utilities for the URI permission manager.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fakes**: in-memory stand-ins for every downstream service, with
//!   scriptable failures and remote death
//! - **Fixtures**: a ready manager with a foundation process, a system app
//!   and a third-party app installed
//! - **Generators**: Proptest strategies for URIs, flags and records
//!
//! ## Test Fixtures
//!
//! ```rust
//! use upms_core::UriFlags;
//! use upms_testkit::TestFixture;
//!
//! let fx = TestFixture::new();
//! let uri = fx.files_app.file_uri("docs/a.txt");
//! fx.grant(&fx.files_app, &[uri.clone()], UriFlags::READ, &fx.viewer).unwrap();
//! assert!(fx.verify(&uri, UriFlags::READ, &fx.viewer));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use upms_testkit::generators::{record_from_params, GrantParams};
//!
//! proptest! {
//!     #[test]
//!     fn merge_keeps_pair(a: GrantParams) {
//!         let r = record_from_params(&a);
//!         prop_assert!(r.same_pair(&r.clone()));
//!     }
//! }
//! ```

pub mod fakes;
pub mod fixtures;
pub mod generators;

pub use fakes::{FakeApp, FakePlatform};
pub use fixtures::TestFixture;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
