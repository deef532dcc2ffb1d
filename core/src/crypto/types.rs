use std::fmt;
use std::str::FromStr;

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{cipher_ids, NONCE_LEN_12, TAG_LEN};
use crate::utils::enum_name_or_hex;

/// AEAD suites a segment may be sealed with. Both take 32-byte keys and
/// 12-byte nonces and produce 16-byte tags.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum CipherSuite {
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm = cipher_ids::AES256_GCM,
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305 = cipher_ids::CHACHA20_POLY1305,
}

impl CipherSuite {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherSuite::Aes256Gcm => "aes-256-gcm",
            CipherSuite::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == CipherSuite::default()
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherSuite {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-256-gcm" | "aes256gcm" | "aes" => Ok(CipherSuite::Aes256Gcm),
            "chacha20-poly1305" | "chacha20poly1305" | "chacha" => Ok(CipherSuite::ChaCha20Poly1305),
            _ => Err(CryptoError::Failure(format!("unknown cipher suite: {s}"))),
        }
    }
}

fn suite_name(id: &u16) -> String {
    enum_name_or_hex::<CipherSuite>(*id)
}

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Unsupported cipher suite id.
    #[error("unsupported cipher suite: {}", suite_name(.cipher_id))]
    UnsupportedCipher { cipher_id: u16 },

    /// Invalid key length provided to cipher.
    #[error("invalid key length: expected={expected}, actual={actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    /// Nonce length mismatch (must be 12 bytes for supported ciphers).
    #[error("invalid nonce length: expected={expected}, actual={actual}")]
    InvalidNonceLen { expected: usize, actual: usize },

    /// Tag length mismatch (must be 16 bytes).
    #[error("invalid tag length: expected={expected}, actual={actual}")]
    InvalidTagLen { expected: usize, actual: usize },

    /// Key material could not be decoded (hex/base64/raw).
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The OS random source failed. Never retried, never replaced.
    #[error("secure random source unavailable: {0}")]
    RandomUnavailable(String),

    /// AEAD tag mismatch (authentication failure).
    #[error("AEAD tag mismatch")]
    TagMismatch,

    /// General runtime error with context.
    #[error("crypto failure: {0}")]
    Failure(String),
}

/// 12-byte per-segment AEAD nonce.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LEN_12]);

impl Nonce {
    pub fn from_bytes(bytes: [u8; NONCE_LEN_12]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; NONCE_LEN_12] = bytes.try_into().map_err(|_| CryptoError::InvalidNonceLen {
            expected: NONCE_LEN_12,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse a hex nonce as stored in the manifest `iv` field. Either case is accepted.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s).map_err(|e| CryptoError::Failure(format!("nonce hex: {e}")))?;
        Self::from_slice(&raw)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN_12] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_hex())
    }
}

/// 16-byte AEAD authentication tag.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Tag([u8; TAG_LEN]);

impl Tag {
    pub fn from_bytes(bytes: [u8; TAG_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; TAG_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidTagLen {
            expected: TAG_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse a hex tag as stored in the manifest `tag` field. Either case is accepted.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s).map_err(|e| CryptoError::Failure(format!("tag hex: {e}")))?;
        Self::from_slice(&raw)
    }

    pub fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.to_hex())
    }
}
