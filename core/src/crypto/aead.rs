//! AEAD interface for AES-256-GCM and ChaCha20-Poly1305.
//!
//! Design notes:
//! - Both ciphers use 32-byte keys and 12-byte nonces.
//! - Segments are sealed in detached-tag mode: the ciphertext has the same
//!   length as the plaintext and the 16-byte tag travels in the manifest.
//! - No associated data. The tag binds (key, nonce, ciphertext).
//! - Tag verification is part of decryption and fails closed: on mismatch the
//!   working buffer is wiped and nothing is returned.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce, Tag as AesTag};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaNonce, Tag as ChaTag};

use crate::constants::KEY_LEN_32;
use crate::crypto::key::Key;
use crate::crypto::types::{CipherSuite, CryptoError, Nonce, Tag};

/// Unified AEAD cipher selected by suite.
#[derive(Clone)]
pub enum AeadImpl {
    AesGcm(Aes256Gcm),
    ChaCha(ChaCha20Poly1305),
}

impl AeadImpl {
    /// Construct the AEAD for `suite` from a validated key.
    pub fn new(suite: CipherSuite, key: &Key) -> Result<Self, CryptoError> {
        Self::from_raw(suite, key.as_bytes())
    }

    /// Construct from raw key bytes; rejects anything that is not 32 bytes.
    pub fn from_raw(suite: CipherSuite, key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN_32 {
            return Err(CryptoError::InvalidKeyLen {
                expected: KEY_LEN_32,
                actual: key.len(),
            });
        }
        let bad_len = |_| CryptoError::InvalidKeyLen { expected: KEY_LEN_32, actual: key.len() };

        match suite {
            CipherSuite::Aes256Gcm => Ok(Self::AesGcm(Aes256Gcm::new_from_slice(key).map_err(bad_len)?)),
            CipherSuite::ChaCha20Poly1305 => {
                Ok(Self::ChaCha(ChaCha20Poly1305::new_from_slice(key).map_err(bad_len)?))
            }
        }
    }

    pub fn suite(&self) -> CipherSuite {
        match self {
            AeadImpl::AesGcm(_) => CipherSuite::Aes256Gcm,
            AeadImpl::ChaCha(_) => CipherSuite::ChaCha20Poly1305,
        }
    }

    /// Seal `plaintext` under `nonce`; returns ciphertext and detached tag.
    pub fn seal_detached(&self, nonce: &Nonce, plaintext: &[u8]) -> Result<(Vec<u8>, Tag), CryptoError> {
        let mut buf = plaintext.to_vec();
        let tag = match self {
            AeadImpl::AesGcm(cipher) => cipher
                .encrypt_in_place_detached(AesNonce::from_slice(nonce.as_bytes()), &[], &mut buf)
                .map_err(|_| CryptoError::Failure("AES-GCM seal failed".into()))?
                .to_vec(),
            AeadImpl::ChaCha(cipher) => cipher
                .encrypt_in_place_detached(ChaNonce::from_slice(nonce.as_bytes()), &[], &mut buf)
                .map_err(|_| CryptoError::Failure("ChaCha20-Poly1305 seal failed".into()))?
                .to_vec(),
        };
        Ok((buf, Tag::from_slice(&tag)?))
    }

    /// Open `ciphertext` with its detached `tag`. Plaintext is only returned
    /// after the tag verified.
    pub fn open_detached(&self, nonce: &Nonce, ciphertext: &[u8], tag: &Tag) -> Result<Vec<u8>, CryptoError> {
        let mut buf = ciphertext.to_vec();
        let verified = match self {
            AeadImpl::AesGcm(cipher) => cipher.decrypt_in_place_detached(
                AesNonce::from_slice(nonce.as_bytes()),
                &[],
                &mut buf,
                AesTag::from_slice(tag.as_bytes()),
            ),
            AeadImpl::ChaCha(cipher) => cipher.decrypt_in_place_detached(
                ChaNonce::from_slice(nonce.as_bytes()),
                &[],
                &mut buf,
                ChaTag::from_slice(tag.as_bytes()),
            ),
        };

        match verified {
            Ok(()) => Ok(buf),
            Err(_) => {
                buf.fill(0);
                Err(CryptoError::TagMismatch)
            }
        }
    }
}
