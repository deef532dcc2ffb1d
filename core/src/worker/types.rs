use bytes::Bytes;

use crate::crypto::{AeadImpl, CipherSuite, CryptoError, Key, Nonce, Tag};
use crate::segment::{Segment, SegmentRole};
use crate::telemetry::StageTimes;

/// Immutable crypto context shared by every worker of one run.
#[derive(Clone)]
pub struct SegmentCryptoContext {
    pub aead: AeadImpl,
}

impl SegmentCryptoContext {
    pub fn new(suite: CipherSuite, key: &Key) -> Result<Self, CryptoError> {
        Ok(Self { aead: AeadImpl::new(suite, key)? })
    }

    pub fn suite(&self) -> CipherSuite {
        self.aead.suite()
    }
}

/// Input from the reader stage. `slot` is the commit position (init first).
#[derive(Debug, Clone)]
pub struct EncryptSegmentInput {
    pub slot: usize,
    pub segment: Segment,
}

/// Sealed segment on its way to the writer stage.
#[derive(Debug)]
pub struct EncryptedSegment {
    pub slot: usize,
    pub index: u32,
    pub role: SegmentRole,
    pub filename: String,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub plaintext_len: usize,
    pub ciphertext: Bytes,
    pub nonce: Nonce,
    pub tag: Tag,
    pub stage_times: StageTimes,
}

#[derive(Debug, Clone)]
pub struct DecryptSegmentInput {
    pub slot: usize,
    pub role: SegmentRole,
    pub filename: String,
    pub ciphertext: Bytes,
    pub nonce: Nonce,
    pub tag: Tag,
}

/// Authenticated plaintext. Only ever built after the tag verified.
#[derive(Debug)]
pub struct DecryptedSegment {
    pub slot: usize,
    pub role: SegmentRole,
    pub filename: String,
    pub ciphertext_len: usize,
    pub plaintext: Bytes,
    pub stage_times: StageTimes,
}
