//! # URI Permission Manager Ledger
//!
//! The authoritative in-memory state of the permission manager.
//!
//! ## Overview
//!
//! - [`GrantLedger`] maps a URI string to the grant records issued for it.
//!   Every operation holds the ledger mutex for its full duration and never
//!   calls out to another service while holding it.
//! - [`TokenIndex`] is a set of token ids behind its own mutex. The manager
//!   keeps two of them: tokens holding raw file grants, and tokens granted
//!   content URIs through the collaborator.
//!
//! The two kinds of lock are never nested.
//!
//! ## Design Notes
//!
//! - **Coalescing inserts**: a second grant for the same (grantor, grantee)
//!   pair is merged into the existing record, never duplicated
//! - **No empty keys**: a URI whose record list becomes empty is erased
//! - **Erase returns work**: erase operations hand back the URIs that the
//!   caller must delete downstream once the lock is released

pub mod index;
pub mod ledger;

pub use index::TokenIndex;
pub use ledger::{GrantLedger, GrantLookup, MergeOutcome, RevokedUris};
