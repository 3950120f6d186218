//! Random token generation.
//!
//! Tokens are alphanumeric so they can be dropped into attribute values and
//! header strings without escaping. [`TokenRegistry`] keeps the set of live
//! tokens so nonces handed out by the server never collide.

use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric};
use rustc_hash::FxHashSet;
use std::sync::LazyLock;

/// Default token length (characters) for nonces and `{rand}`.
pub const DEFAULT_TOKEN_LEN: usize = 16;

/// Live tokens kept before the registry is flushed.
const REGISTRY_CAPACITY: usize = 10_000;

/// Process-wide registry used for request nonces.
pub static NONCES: LazyLock<TokenRegistry> = LazyLock::new(TokenRegistry::default);

/// Generate `len` random alphanumeric characters.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a token not present in `taken`, then record it.
pub fn unique_token(len: usize, taken: &mut FxHashSet<String>) -> String {
    loop {
        let token = random_token(len);
        if taken.insert(token.clone()) {
            return token;
        }
    }
}

/// Collision set for tokens that must be unique while they are live.
///
/// Lookups take the read lock and run in parallel; inserting and the
/// capacity flush take the write lock.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    live: RwLock<FxHashSet<String>>,
}

impl TokenRegistry {
    /// Issue a fresh token of `len` characters.
    pub fn issue(&self, len: usize) -> String {
        loop {
            let token = random_token(len);
            if self.live.read().contains(&token) {
                continue;
            }

            let mut live = self.live.write();
            if live.len() >= REGISTRY_CAPACITY {
                live.clear();
            }
            if live.insert(token.clone()) {
                return token;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_alphanumeric() {
        let token = random_token(32);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unique_token_records() {
        let mut taken = FxHashSet::default();
        let a = unique_token(8, &mut taken);
        let b = unique_token(8, &mut taken);
        assert_ne!(a, b);
        assert_eq!(taken.len(), 2);
    }

    #[test]
    fn test_registry_records_issued() {
        let registry = TokenRegistry::default();
        let token = registry.issue(DEFAULT_TOKEN_LEN);
        assert!(registry.live.read().contains(&token));
        assert_eq!(registry.live.read().len(), 1);
    }

    #[test]
    fn test_registry_unique_under_small_alphabet() {
        // Single-character tokens force collisions; every issued one must still differ.
        let registry = TokenRegistry::default();
        let issued: FxHashSet<String> = (0..40).map(|_| registry.issue(1)).collect();
        assert_eq!(issued.len(), 40);
    }
}
