//! Per-segment workers.
//!
//! Workers are stateless between segments: each input carries everything
//! needed to seal or open it, and results go back tagged with their slot so
//! the collecting stage can restore order.

pub mod types;
pub mod encrypt;
pub mod decrypt;

pub use types::{
    DecryptSegmentInput, DecryptedSegment, EncryptSegmentInput, EncryptedSegment, SegmentCryptoContext,
};

pub use encrypt::{encrypt_segment, encrypt_segment_raw, encrypt_segment_with, EncryptSegmentWorker};
pub use decrypt::{decrypt_entry, decrypt_segment, decrypt_segment_with, DecryptSegmentWorker};
