//! Per-segment nonce generation.
//!
//! Every segment gets an independent 12-byte nonce drawn from the OS CSPRNG.
//! Nothing is derived from counters or indices, and no state survives
//! between runs.
//!
//! Security notes:
//! - An RNG failure is fatal. There is no fallback source.
//! - `NonceRegistry` catches duplicates inside one run. A hit means the RNG is
//!   broken, so the run aborts instead of retrying.

use std::collections::HashSet;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::NONCE_LEN_12;
use crate::crypto::types::{CryptoError, Nonce};

/// Draw a fresh nonce from the OS random source.
#[inline]
pub fn generate_nonce() -> Result<Nonce, CryptoError> {
    generate_nonce_with(&mut OsRng)
}

/// Draw a fresh nonce from `rng`. Errors are surfaced, never swallowed.
pub fn generate_nonce_with<R: RngCore + ?Sized>(rng: &mut R) -> Result<Nonce, CryptoError> {
    let mut bytes = [0u8; NONCE_LEN_12];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::RandomUnavailable(e.to_string()))?;
    Ok(Nonce::from_bytes(bytes))
}

/// Tracks every nonce emitted under one key during one run.
#[derive(Debug, Default)]
pub struct NonceRegistry {
    seen: HashSet<Nonce>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nonce`; fails if it was already issued in this run.
    pub fn register(&mut self, nonce: Nonce) -> Result<(), CryptoError> {
        if !self.seen.insert(nonce) {
            return Err(CryptoError::Failure(format!(
                "nonce {} issued twice under one key",
                nonce.to_hex()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0)
        }
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "entropy pool gone",
            )))
        }
    }

    #[test]
    fn broken_rng_is_fatal() {
        let err = generate_nonce_with(&mut BrokenRng).unwrap_err();
        assert!(matches!(err, CryptoError::RandomUnavailable(_)));
    }

    #[test]
    fn nonces_are_twelve_bytes_and_distinct() {
        let mut registry = NonceRegistry::new();
        for _ in 0..10_000 {
            let n = generate_nonce().unwrap();
            assert_eq!(n.as_bytes().len(), NONCE_LEN_12);
            registry.register(n).unwrap();
        }
        assert_eq!(registry.len(), 10_000);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = NonceRegistry::new();
        let n = Nonce::from_bytes([7; NONCE_LEN_12]);
        registry.register(n).unwrap();
        assert!(registry.register(n).is_err());
    }
}
