//! # URI Permission Manager Core
//!
//! Pure primitives for the URI permission manager: token identities, access
//! flags, grant records and URI classification.
//!
//! This crate contains no I/O, no locking and no downstream service calls.
//! Everything here is plain data plus total functions over it.
//!
//! ## Key Types
//!
//! - [`TokenId`] - Opaque identity of a running app or process instance
//! - [`UriFlags`] - READ/WRITE bitmask requested or held
//! - [`GrantRecord`] - One accumulated grant from a grantor to a grantee
//! - [`Uri`] / [`UriClass`] - Parsed URI and the backend class it maps to
//! - [`UpmsError`] - Error taxonomy with stable integer wire codes

pub mod constants;
pub mod error;
pub mod types;
pub mod uri;

pub use constants::{permission, uid, DEFAULT_ABILITY_ID, DOCS_AUTHORITY, MEDIA_AUTHORITY};
pub use error::{Result, UpmsError};
pub use types::{merge_records, CallingContext, GrantRecord, TokenId, UriFlags};
pub use uri::{classify, is_distributed_subdir, split_network_id, Uri, UriClass, NETWORK_ID_MARK};
