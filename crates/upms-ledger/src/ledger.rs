//! The grant ledger: URI string to grant records.
//!
//! Keys are kept in a `BTreeMap` so the distributed-subdirectory scan has a
//! deterministic order (descending by key).

use std::collections::BTreeMap;

use parking_lot::Mutex;

use upms_core::{is_distributed_subdir, GrantRecord, TokenId, Uri, UriFlags, NETWORK_ID_MARK};

/// URIs to delete downstream, grouped by grantee token.
pub type RevokedUris = BTreeMap<TokenId, Vec<String>>;

/// Result of [`GrantLedger::add_or_merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new record was appended.
    Inserted,
    /// An existing record for the same pair absorbed the grant.
    Merged,
}

/// Result of an exact-key lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantLookup {
    /// A record for the grantee satisfies the flag.
    Matched,
    /// The URI is in the ledger but no record satisfies the query.
    NotMatched,
    /// The URI is not in the ledger.
    Absent,
}

/// In-memory grant ledger. Thread-safe via a single mutex.
#[derive(Default)]
pub struct GrantLedger {
    uri_map: Mutex<BTreeMap<String, Vec<GrantRecord>>>,
}

impl GrantLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a grant, OR-merging into an existing record for the same pair.
    pub fn add_or_merge(&self, uri: &str, record: GrantRecord) -> MergeOutcome {
        let mut map = self.uri_map.lock();
        let list = map.entry(uri.to_string()).or_default();

        if let Some(existing) = list.iter_mut().find(|r| r.same_pair(&record)) {
            existing.merge_from(&record);
            tracing::debug!(
                from = %record.from_token,
                to = %record.to_token,
                flag = ?existing.flag,
                "merged uri grant"
            );
            return MergeOutcome::Merged;
        }

        tracing::debug!(from = %record.from_token, to = %record.to_token, "inserted uri grant");
        list.push(record);
        MergeOutcome::Inserted
    }

    /// Look up the exact URI key for a record held by `to_token` that
    /// satisfies `flag`.
    pub fn lookup_grant(&self, uri: &str, to_token: TokenId, flag: UriFlags) -> GrantLookup {
        let required = flag.required_bit();
        let map = self.uri_map.lock();
        match map.get(uri) {
            Some(list) if Self::list_grants(list, to_token, required) => GrantLookup::Matched,
            Some(_) => GrantLookup::NotMatched,
            None => GrantLookup::Absent,
        }
    }

    /// True if `to_token` holds a record for exactly `uri` satisfying `flag`.
    pub fn find_grant(&self, uri: &str, to_token: TokenId, flag: UriFlags) -> bool {
        self.lookup_grant(uri, to_token, flag) == GrantLookup::Matched
    }

    /// Match a distributed docs URI against a granted ancestor directory
    /// carrying the same network id.
    ///
    /// Keys are scanned in descending order and only the first distributed
    /// ancestor found is consulted.
    pub fn find_subdirectory_grant(&self, uri: &str, to_token: TokenId, flag: UriFlags) -> bool {
        if !uri.contains(NETWORK_ID_MARK) {
            return false;
        }
        let required = flag.required_bit();
        let map = self.uri_map.lock();
        map.iter()
            .rev()
            .find(|(key, _)| is_distributed_subdir(uri, key))
            .map(|(_, list)| Self::list_grants(list, to_token, required))
            .unwrap_or(false)
    }

    /// Exact match, falling back to the subdirectory scan only when the key
    /// is absent.
    pub fn verify(&self, uri: &str, to_token: TokenId, flag: UriFlags) -> bool {
        match self.lookup_grant(uri, to_token, flag) {
            GrantLookup::Matched => true,
            GrantLookup::NotMatched => false,
            GrantLookup::Absent => self.find_subdirectory_grant(uri, to_token, flag),
        }
    }

    fn list_grants(list: &[GrantRecord], to_token: TokenId, required: UriFlags) -> bool {
        list.iter()
            .any(|r| r.to_token == to_token && UriFlags::satisfies(r.flag, required))
    }

    /// Erase every record naming `token` as grantee or grantor, and every
    /// entry whose authority is `own_authority` (the token's own URIs).
    ///
    /// Returns the erased URIs grouped by grantee so the caller can delete
    /// the matching share files after the lock is released.
    pub fn erase_all_for_token(&self, token: TokenId, own_authority: Option<&str>) -> RevokedUris {
        let mut revoked = RevokedUris::new();
        let mut map = self.uri_map.lock();

        map.retain(|uri, list| {
            let owned = own_authority
                .map(|authority| Uri::parse(uri.as_str()).authority() == authority)
                .unwrap_or(false);
            if owned {
                for record in list.iter() {
                    revoked.entry(record.to_token).or_default().push(uri.clone());
                }
                return false;
            }

            list.retain(|record| {
                if record.to_token == token || record.from_token == token {
                    revoked.entry(record.to_token).or_default().push(uri.clone());
                    false
                } else {
                    true
                }
            });
            !list.is_empty()
        });

        let count: usize = revoked.values().map(Vec::len).sum();
        if count > 0 {
            tracing::info!(token = %token, count, "erased uri grants for token");
        }
        revoked
    }

    /// Erase the record granting `uri` to `target`.
    ///
    /// The caller may revoke when it issued the grant, when it is the
    /// grantee, or when it owns the URI's authority. Returns whether a
    /// record was removed.
    pub fn erase_one_grant(
        &self,
        uri: &str,
        caller: TokenId,
        target: TokenId,
        caller_owns_authority: bool,
    ) -> bool {
        let is_revoke_self = caller == target || caller_owns_authority;
        let mut map = self.uri_map.lock();
        let Some(list) = map.get_mut(uri) else {
            return false;
        };

        let position = list
            .iter()
            .position(|r| r.to_token == target && (r.from_token == caller || is_revoke_self));
        let removed = match position {
            Some(i) => {
                list.remove(i);
                true
            }
            None => false,
        };

        if list.is_empty() {
            map.remove(uri);
        }
        if removed {
            tracing::info!(caller = %caller, target_token = %target, "revoked uri grant");
        }
        removed
    }

    /// Drop `ability_id` from every auto-remove record held by `token`.
    ///
    /// Records whose ability set becomes empty are erased; their URIs are
    /// returned for share-file deletion.
    pub fn remove_ability(&self, token: TokenId, ability_id: i32) -> Vec<String> {
        let mut uris = Vec::new();
        let mut map = self.uri_map.lock();

        map.retain(|uri, list| {
            list.retain_mut(|record| {
                if record.to_token != token
                    || !record.auto_remove
                    || !record.remove_ability(ability_id)
                {
                    return true;
                }
                if record.ability_ids.is_empty() {
                    uris.push(uri.clone());
                    return false;
                }
                true
            });
            !list.is_empty()
        });
        uris
    }

    /// Copy of the records for one URI.
    pub fn records_for(&self, uri: &str) -> Vec<GrantRecord> {
        self.uri_map.lock().get(uri).cloned().unwrap_or_default()
    }

    /// Copy of every (uri, record) pair, in key order.
    pub fn snapshot(&self) -> Vec<(String, GrantRecord)> {
        let map = self.uri_map.lock();
        map.iter()
            .flat_map(|(uri, list)| list.iter().map(move |r| (uri.clone(), r.clone())))
            .collect()
    }

    /// True if any record names `token` as grantee.
    pub fn has_grantee(&self, token: TokenId) -> bool {
        let map = self.uri_map.lock();
        map.values().flatten().any(|r| r.to_token == token)
    }

    /// Number of distinct URI keys.
    pub fn uri_count(&self) -> usize {
        self.uri_map.lock().len()
    }

    /// Total number of records.
    pub fn record_count(&self) -> usize {
        self.uri_map.lock().values().map(Vec::len).sum()
    }

    /// True if the ledger holds no records.
    pub fn is_empty(&self) -> bool {
        self.uri_map.lock().is_empty()
    }
}
