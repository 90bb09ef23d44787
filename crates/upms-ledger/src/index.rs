//! Token indexes.

use std::collections::HashSet;

use parking_lot::Mutex;

use upms_core::TokenId;

/// A set of token ids behind its own mutex.
///
/// Used for fast-path checks ("has this token ever been granted anything?")
/// before the more expensive ledger scan.
#[derive(Default)]
pub struct TokenIndex {
    tokens: Mutex<HashSet<TokenId>>,
}

impl TokenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a token. Returns true if it was not already present.
    pub fn insert(&self, token: TokenId) -> bool {
        self.tokens.lock().insert(token)
    }

    /// Forget a token. Returns true if it was present.
    pub fn remove(&self, token: TokenId) -> bool {
        self.tokens.lock().remove(&token)
    }

    pub fn contains(&self, token: TokenId) -> bool {
        self.tokens.lock().contains(&token)
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_remove() {
        let index = TokenIndex::new();
        assert!(index.insert(TokenId(7)));
        assert!(!index.insert(TokenId(7)));
        assert!(index.contains(TokenId(7)));
        assert!(index.remove(TokenId(7)));
        assert!(!index.remove(TokenId(7)));
        assert!(index.is_empty());
    }

    proptest! {
        #[test]
        fn test_len_counts_distinct(tokens in proptest::collection::vec(0u32..32, 0..64)) {
            let index = TokenIndex::new();
            for t in &tokens {
                index.insert(TokenId(*t));
            }
            let distinct: HashSet<u32> = tokens.into_iter().collect();
            prop_assert_eq!(index.len(), distinct.len());
        }
    }
}
