//! Strong type definitions for the URI permission manager.
//!
//! Identities and flags are newtypes to prevent mixing a token id with a
//! pid or a raw flag with a mode.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{uid, DEFAULT_ABILITY_ID};

/// Numeric identity assigned by the access-control subsystem to a running
/// app or process instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl TokenId {
    /// Create a token id from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// The zero token (never assigned to a real process).
    pub const INVALID: Self = Self(0);
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TokenId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Bitmask of URI access rights.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UriFlags(pub u32);

impl UriFlags {
    /// Read access.
    pub const READ: Self = Self(1 << 0);
    /// Write access.
    pub const WRITE: Self = Self(1 << 1);
    /// Read and write.
    pub const READ_WRITE: Self = Self(Self::READ.0 | Self::WRITE.0);
    /// Request that a docs policy outlives the grantee process.
    pub const PERSISTABLE: Self = Self(1 << 6);

    /// Create from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set.
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// A request flag is valid when it asks for READ or WRITE.
    pub const fn is_valid(&self) -> bool {
        self.intersects(Self::READ_WRITE)
    }

    /// Keep only READ|WRITE.
    pub const fn access(&self) -> Self {
        Self(self.0 & Self::READ_WRITE.0)
    }

    /// The single bit a verify call must find: WRITE if requested, else READ.
    pub const fn required_bit(&self) -> Self {
        if self.intersects(Self::WRITE) {
            Self::WRITE
        } else {
            Self::READ
        }
    }

    /// Does a record holding `held` satisfy a check for `required`?
    ///
    /// READ is always OR-ed into the held flag before the test.
    pub const fn satisfies(held: Self, required: Self) -> bool {
        (held.0 | Self::READ.0) & required.0 != 0
    }
}

impl std::ops::BitOr for UriFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for UriFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for UriFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.intersects(Self::READ) { "r" } else { "-" };
        let w = if self.intersects(Self::WRITE) { "w" } else { "-" };
        write!(f, "UriFlags({}{}:{:#x})", r, w, self.0)
    }
}

/// One permission a grantor has extended to a grantee over one URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    /// Accumulated access rights.
    pub flag: UriFlags,

    /// Token that extended the grant.
    pub from_token: TokenId,

    /// Token that received the grant.
    pub to_token: TokenId,

    /// Removed automatically once every owning ability has gone away.
    pub auto_remove: bool,

    /// Abilities holding this grant alive (auto-remove grants only).
    pub ability_ids: BTreeSet<i32>,
}

impl GrantRecord {
    /// Create a record. A non-default ability id makes it auto-remove.
    pub fn new(flag: UriFlags, from_token: TokenId, to_token: TokenId, ability_id: i32) -> Self {
        let mut ability_ids = BTreeSet::new();
        let auto_remove = ability_id != DEFAULT_ABILITY_ID;
        if auto_remove {
            ability_ids.insert(ability_id);
        }
        Self {
            flag,
            from_token,
            to_token,
            auto_remove,
            ability_ids,
        }
    }

    /// Same (grantor, grantee) pair.
    pub fn same_pair(&self, other: &GrantRecord) -> bool {
        self.from_token == other.from_token && self.to_token == other.to_token
    }

    /// Fold `other` into `self` (see [`merge_records`]).
    pub fn merge_from(&mut self, other: &GrantRecord) {
        self.flag |= other.flag;
        self.auto_remove = self.auto_remove && other.auto_remove;
        self.ability_ids.extend(other.ability_ids.iter().copied());
    }

    /// Drop an ability id. Returns true if it was present.
    pub fn remove_ability(&mut self, ability_id: i32) -> bool {
        self.ability_ids.remove(&ability_id)
    }
}

/// Commutative, idempotent merge of two records for the same pair.
///
/// Flags are OR-ed, a grant stays auto-remove only if both sides are, and
/// ability sets are unioned.
pub fn merge_records(a: &GrantRecord, b: &GrantRecord) -> GrantRecord {
    let mut merged = a.clone();
    merged.merge_from(b);
    merged
}

/// Identity of the peer on the other side of the current IPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallingContext {
    /// Calling token id.
    pub token_id: TokenId,
    /// Calling process id.
    pub pid: i32,
    /// Calling uid.
    pub uid: i32,
}

impl CallingContext {
    /// Build a context from its parts.
    pub const fn new(token_id: TokenId, pid: i32, uid: i32) -> Self {
        Self { token_id, pid, uid }
    }

    /// Call comes from the foundation process.
    pub const fn is_foundation(&self) -> bool {
        self.uid == uid::FOUNDATION
    }

    /// Call comes from UDMF or one of the pasteboard processes.
    pub const fn is_udmf_or_pasteboard(&self) -> bool {
        self.uid == uid::UDMF || self.uid == uid::PASTEBOARD || self.uid == uid::BROKER_PASTEBOARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(flag: u32, ability: i32) -> GrantRecord {
        GrantRecord::new(UriFlags(flag), TokenId(1), TokenId(2), ability)
    }

    #[test]
    fn test_flag_validity() {
        assert!(UriFlags::READ.is_valid());
        assert!(UriFlags::WRITE.is_valid());
        assert!(!UriFlags(0).is_valid());
        assert!(!UriFlags::PERSISTABLE.is_valid());
        assert_eq!((UriFlags::PERSISTABLE | UriFlags::WRITE).access(), UriFlags::WRITE);
    }

    #[test]
    fn test_required_bit() {
        assert_eq!(UriFlags::READ.required_bit(), UriFlags::READ);
        assert_eq!(UriFlags::READ_WRITE.required_bit(), UriFlags::WRITE);
    }

    #[test]
    fn test_satisfies_implicit_read() {
        // A write-only record still satisfies a read check.
        assert!(UriFlags::satisfies(UriFlags::WRITE, UriFlags::READ));
        assert!(UriFlags::satisfies(UriFlags::READ, UriFlags::READ));
        assert!(!UriFlags::satisfies(UriFlags::READ, UriFlags::WRITE));
        assert!(UriFlags::satisfies(UriFlags::WRITE, UriFlags::WRITE));
    }

    #[test]
    fn test_merge_read_then_write() {
        let merged = merge_records(&record(1, -1), &record(2, -1));
        assert_eq!(merged.flag, UriFlags::READ_WRITE);
        assert!(!merged.auto_remove);
    }

    #[test]
    fn test_merge_auto_remove_is_sticky_false() {
        let merged = merge_records(&record(1, 7), &record(1, -1));
        assert!(!merged.auto_remove);
        assert!(merged.ability_ids.contains(&7));

        let both = merge_records(&record(1, 7), &record(1, 8));
        assert!(both.auto_remove);
        assert_eq!(both.ability_ids.len(), 2);
    }

    #[test]
    fn test_calling_context_predicates() {
        assert!(CallingContext::new(TokenId(1), 1, uid::FOUNDATION).is_foundation());
        assert!(CallingContext::new(TokenId(1), 1, uid::PASTEBOARD).is_udmf_or_pasteboard());
        assert!(!CallingContext::new(TokenId(1), 1, 20010001).is_udmf_or_pasteboard());
    }

    fn arb_record() -> impl Strategy<Value = GrantRecord> {
        (1u32..=3, prop_oneof![Just(-1i32), 0i32..8]).prop_map(|(flag, ability)| record(flag, ability))
    }

    proptest! {
        #[test]
        fn test_merge_commutative(a in arb_record(), b in arb_record()) {
            prop_assert_eq!(merge_records(&a, &b), merge_records(&b, &a));
        }

        #[test]
        fn test_merge_idempotent(a in arb_record()) {
            prop_assert_eq!(merge_records(&a, &a), a);
        }

        #[test]
        fn test_merge_associative(a in arb_record(), b in arb_record(), c in arb_record()) {
            let left = merge_records(&merge_records(&a, &b), &c);
            let right = merge_records(&a, &merge_records(&b, &c));
            prop_assert_eq!(left, right);
        }
    }
}
