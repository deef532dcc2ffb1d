//! Segment encryptor.
//!
//! Every call draws a fresh nonce from the OS RNG and seals the whole segment
//! in detached-tag mode. Nothing is persisted here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender};
use tracing::debug;

use crate::crypto::{generate_nonce, AeadImpl, CipherSuite, CryptoError, Key, Nonce, Tag};
use crate::telemetry::{Stage, StageTimes};
use crate::types::StreamError;
use crate::worker::types::{EncryptSegmentInput, EncryptedSegment, SegmentCryptoContext};

/// Seal one segment with AES-256-GCM under a fresh nonce.
pub fn encrypt_segment(plaintext: &[u8], key: &Key) -> Result<(Vec<u8>, Nonce, Tag), CryptoError> {
    encrypt_segment_with(&AeadImpl::new(CipherSuite::default(), key)?, plaintext)
}

/// As [`encrypt_segment`], for callers holding raw key bytes.
pub fn encrypt_segment_raw(plaintext: &[u8], key: &[u8]) -> Result<(Vec<u8>, Nonce, Tag), CryptoError> {
    encrypt_segment_with(&AeadImpl::from_raw(CipherSuite::default(), key)?, plaintext)
}

pub fn encrypt_segment_with(aead: &AeadImpl, plaintext: &[u8]) -> Result<(Vec<u8>, Nonce, Tag), CryptoError> {
    let nonce = generate_nonce()?;
    let (ciphertext, tag) = aead.seal_detached(&nonce, plaintext)?;
    Ok((ciphertext, nonce, tag))
}

pub struct EncryptSegmentWorker {
    crypto: SegmentCryptoContext,
}

impl EncryptSegmentWorker {
    pub fn new(crypto: SegmentCryptoContext) -> Self {
        Self { crypto }
    }

    /// Run loop: consumes plaintext segments until the channel closes, the
    /// receiver goes away, or `cancel` is raised.
    pub fn run(
        &self,
        rx: Receiver<EncryptSegmentInput>,
        tx: Sender<Result<EncryptedSegment, StreamError>>,
        cancel: &AtomicBool,
    ) {
        while let Ok(input) = rx.recv() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let result = self.process(input);
            if tx.send(result).is_err() {
                debug!("encrypt worker: writer gone");
                return;
            }
        }
    }

    pub fn process(&self, input: EncryptSegmentInput) -> Result<EncryptedSegment, StreamError> {
        let mut stage_times = StageTimes::default();
        let segment = input.segment;
        let filename = segment.output_filename();

        let start = Instant::now();
        let (ciphertext, nonce, tag) = encrypt_segment_with(&self.crypto.aead, &segment.bytes)?;
        stage_times.add(Stage::Encrypt, start.elapsed());

        debug!(slot = input.slot, segment = %filename, len = segment.bytes.len(), "segment sealed");

        Ok(EncryptedSegment {
            slot: input.slot,
            index: segment.index,
            role: segment.role,
            filename,
            start: segment.start,
            duration: segment.duration,
            plaintext_len: segment.bytes.len(),
            ciphertext: Bytes::from(ciphertext),
            nonce,
            tag,
            stage_times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

    #[test]
    fn ciphertext_has_plaintext_length() {
        let key = Key::from_bytes([3; 32]);
        for len in [0usize, 1, 400, 1000] {
            let (ct, _, _) = encrypt_segment(&vec![0x5a; len], &key).unwrap();
            assert_eq!(ct.len(), len);
        }
    }

    #[test]
    fn same_plaintext_twice_gives_different_nonces_and_ciphertexts() {
        let key = Key::from_bytes([3; 32]);
        let (c1, n1, t1) = encrypt_segment(b"same bytes", &key).unwrap();
        let (c2, n2, t2) = encrypt_segment(b"same bytes", &key).unwrap();
        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
        assert_ne!(t1, t2);
    }

    #[test]
    fn raw_key_must_be_32_bytes() {
        let err = encrypt_segment_raw(b"x", &[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLen { expected: 32, actual: 16 }));
    }

    #[test]
    fn worker_keeps_slot_and_metadata() {
        let ctx = SegmentCryptoContext::new(CipherSuite::ChaCha20Poly1305, &Key::from_bytes([1; 32])).unwrap();
        let mut seg = Segment::media(4, &b"payload"[..]);
        seg.start = Some(40.0);
        let out = EncryptSegmentWorker::new(ctx).process(EncryptSegmentInput { slot: 5, segment: seg }).unwrap();
        assert_eq!(out.slot, 5);
        assert_eq!(out.filename, "chunk004.enc");
        assert_eq!(out.start, Some(40.0));
        assert_eq!(out.plaintext_len, 7);
        assert!(out.stage_times.has_all(&[Stage::Encrypt]));
    }
}
