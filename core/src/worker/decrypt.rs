//! Segment decryptor.
//!
//! Decryption and tag verification are one step. A segment that fails to
//! authenticate yields an error and no bytes.

use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::crypto::{AeadImpl, CipherSuite, Key, Nonce, Tag};
use crate::manifest::ManifestEntry;
use crate::telemetry::{Stage, StageTimes};
use crate::types::StreamError;
use crate::worker::types::{DecryptSegmentInput, DecryptedSegment, SegmentCryptoContext};

/// Open one AES-256-GCM segment.
pub fn decrypt_segment(ciphertext: &[u8], nonce: &Nonce, tag: &Tag, key: &Key) -> Result<Vec<u8>, StreamError> {
    decrypt_segment_with(&AeadImpl::new(CipherSuite::default(), key)?, ciphertext, nonce, tag)
}

pub fn decrypt_segment_with(aead: &AeadImpl, ciphertext: &[u8], nonce: &Nonce, tag: &Tag) -> Result<Vec<u8>, StreamError> {
    Ok(aead.open_detached(nonce, ciphertext, tag)?)
}

/// Open a segment using the hex `iv`/`tag` of its manifest entry. `cipher`
/// is the manifest's `cipher` field.
pub fn decrypt_entry(
    ciphertext: &[u8],
    entry: &ManifestEntry,
    cipher: CipherSuite,
    key: &Key,
) -> Result<Vec<u8>, StreamError> {
    let nonce = entry.nonce()?;
    let tag = entry.tag()?;
    let aead = AeadImpl::new(cipher, key)?;
    decrypt_segment_with(&aead, ciphertext, &nonce, &tag).map_err(|e| e.for_segment(&entry.filename))
}

pub struct DecryptSegmentWorker {
    crypto: SegmentCryptoContext,
}

impl DecryptSegmentWorker {
    pub fn new(crypto: SegmentCryptoContext) -> Self {
        Self { crypto }
    }

    pub fn run(&self, rx: Receiver<DecryptSegmentInput>, tx: Sender<Result<DecryptedSegment, StreamError>>) {
        while let Ok(input) = rx.recv() {
            if tx.send(self.process(input)).is_err() {
                debug!("decrypt worker: collector gone");
                return;
            }
        }
    }

    pub fn process(&self, input: DecryptSegmentInput) -> Result<DecryptedSegment, StreamError> {
        let mut stage_times = StageTimes::default();
        let start = Instant::now();
        let plaintext = decrypt_segment_with(&self.crypto.aead, &input.ciphertext, &input.nonce, &input.tag)
            .map_err(|e| {
                warn!(segment = %input.filename, "segment failed authentication");
                e.for_segment(&input.filename)
            })?;
        stage_times.add(Stage::Decrypt, start.elapsed());

        Ok(DecryptedSegment {
            slot: input.slot,
            role: input.role,
            filename: input.filename,
            ciphertext_len: input.ciphertext.len(),
            plaintext: Bytes::from(plaintext),
            stage_times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::encrypt::encrypt_segment;

    #[test]
    fn round_trip_and_idempotent() {
        let key = Key::from_bytes([9; 32]);
        let (ct, nonce, tag) = encrypt_segment(b"segment body", &key).unwrap();
        let a = decrypt_segment(&ct, &nonce, &tag, &key).unwrap();
        let b = decrypt_segment(&ct, &nonce, &tag, &key).unwrap();
        assert_eq!(a, b"segment body");
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_key_is_authentication_failure() {
        let (ct, nonce, tag) = encrypt_segment(b"x", &Key::from_bytes([1; 32])).unwrap();
        let err = decrypt_segment(&ct, &nonce, &tag, &Key::from_bytes([2; 32])).unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn entry_with_bad_hex_is_manifest_corrupt() {
        let key = Key::from_bytes([1; 32]);
        let (ct, nonce, tag) = encrypt_segment(b"abc", &key).unwrap();
        let mut entry = ManifestEntry::new("chunk000.enc", &nonce, &tag);
        assert_eq!(decrypt_entry(&ct, &entry, CipherSuite::Aes256Gcm, &key).unwrap(), b"abc");

        entry.iv.pop();
        assert!(matches!(decrypt_entry(&ct, &entry, CipherSuite::Aes256Gcm, &key), Err(StreamError::ManifestCorrupt(_))));
        entry.iv = "zz".repeat(12);
        assert!(matches!(decrypt_entry(&ct, &entry, CipherSuite::Aes256Gcm, &key), Err(StreamError::ManifestCorrupt(_))));
    }

    #[test]
    fn entry_failure_names_the_segment() {
        let key = Key::from_bytes([1; 32]);
        let (mut ct, nonce, tag) = encrypt_segment(b"abc", &key).unwrap();
        ct[0] ^= 1;
        let entry = ManifestEntry::new("chunk007.enc", &nonce, &tag);
        let err = decrypt_entry(&ct, &entry, CipherSuite::Aes256Gcm, &key).unwrap_err();
        assert_eq!(err.to_string(), "authentication failure: segment chunk007.enc unavailable");
    }
}
