//! Asset key custody.
//!
//! The key is always an explicit value: generated per asset, loaded from a
//! file, or handed over by a [`KeyProvider`]. Nothing in this crate carries a
//! built-in key.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::{KEY_FILENAME, KEY_LEN_32};
use crate::crypto::types::CryptoError;
use crate::types::StreamError;

/// 32-byte symmetric asset key.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN_32]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN_32]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh key from the OS random source.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN_32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::RandomUnavailable(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN_32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLen {
            expected: KEY_LEN_32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse a 64-char hex key.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidKeyEncoding(format!("hex: {e}")))?;
        Self::from_slice(&raw)
    }

    /// Parse a standard-alphabet base64 key (what browser `importKey("raw")` callers hold).
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let raw = STANDARD
            .decode(s.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding(format!("base64: {e}")))?;
        Self::from_slice(&raw)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN_32] {
        &self.0
    }

    /// Stable, non-reversible identifier for this key (first 16 hex chars of a
    /// keyed BLAKE3 over a fixed label). Safe to write next to ciphertext.
    pub fn fingerprint(&self) -> String {
        let hash = blake3::keyed_hash(&self.0, b"media-crypt key fingerprint v1");
        hash.to_hex()[..16].to_string()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.fingerprint())
    }
}

/// Opaque caller credentials passed through to a key provider.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub bearer: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self { bearer: Some(token.into()) }
    }
}

/// Pluggable key acquisition. The core's encrypt/decrypt contracts never
/// depend on how a provider authenticates the request.
pub trait KeyProvider: Send + Sync {
    fn fetch_key(&self, asset_id: &str, credentials: &Credentials) -> Result<Key, StreamError>;
}

/// Hands back one injected key for every asset (tests, embedding).
#[derive(Clone, Debug)]
pub struct StaticKeyProvider {
    key: Key,
}

impl StaticKeyProvider {
    pub fn new(key: Key) -> Self {
        Self { key }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn fetch_key(&self, _asset_id: &str, _credentials: &Credentials) -> Result<Key, StreamError> {
        Ok(self.key.clone())
    }
}

/// Reads `<root>/<asset_id>/aes_key.bin`.
///
/// The raw key sits next to the ciphertext and is handed out without
/// authentication. Not a security boundary: credentials are ignored.
#[derive(Clone, Debug)]
pub struct FileKeyProvider {
    root: PathBuf,
}

impl FileKeyProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl KeyProvider for FileKeyProvider {
    fn fetch_key(&self, asset_id: &str, _credentials: &Credentials) -> Result<Key, StreamError> {
        let asset_dir = if asset_id.is_empty() { self.root.clone() } else { self.root.join(asset_id) };
        read_key_file(&asset_dir.join(KEY_FILENAME))
    }
}

/// Read a raw 32-byte key file.
pub fn read_key_file(path: &Path) -> Result<Key, StreamError> {
    let raw = fs::read(path)?;
    Ok(Key::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_key_bytes() {
        let key = Key::from_bytes([0x41; KEY_LEN_32]);
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains("4141"));
        assert!(dbg.starts_with("Key("));
    }

    #[test]
    fn base64_and_hex_parse_to_same_key() {
        let key = Key::from_bytes([0x41; KEY_LEN_32]);
        let b64 = "QUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUE=";
        assert_eq!(key.to_base64(), b64);
        assert_eq!(Key::from_base64(b64).unwrap(), key);
        assert_eq!(Key::from_hex(&"41".repeat(32)).unwrap(), key);
    }

    #[test]
    fn bad_key_material_is_rejected() {
        assert!(matches!(Key::from_slice(&[0u8; 31]), Err(CryptoError::InvalidKeyLen { .. })));
        assert!(matches!(Key::from_hex("xyz"), Err(CryptoError::InvalidKeyEncoding(_))));
        assert!(matches!(Key::from_base64("QUFB"), Err(CryptoError::InvalidKeyLen { .. })));
    }

    #[test]
    fn generated_keys_differ() {
        let a = Key::generate().unwrap();
        let b = Key::generate().unwrap();
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn file_provider_reads_asset_key() {
        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join("movie");
        fs::create_dir_all(&asset).unwrap();
        let key = Key::from_bytes([5u8; KEY_LEN_32]);
        fs::write(asset.join(KEY_FILENAME), key.as_bytes()).unwrap();

        let provider = FileKeyProvider::new(dir.path());
        let fetched = provider.fetch_key("movie", &Credentials::anonymous()).unwrap();
        assert_eq!(fetched, key);
        assert!(provider.fetch_key("missing", &Credentials::bearer("t")).is_err());
    }
}
