//! Mutable counters collected while a pipeline runs.
//!
//! Workers keep their own copy and the writer stage merges them, so no
//! counter is ever shared between threads.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::segment::SegmentRole;

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub segments_media: u64,
    pub segments_init: u64,
    /// Segments taken over from a journal instead of being re-encrypted.
    pub segments_resumed: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
    pub auth_failures: u64,
}

impl TelemetryCounters {
    fn count_role(&mut self, role: SegmentRole) {
        match role {
            SegmentRole::Init => self.segments_init += 1,
            SegmentRole::Media => self.segments_media += 1,
        }
    }

    /// One freshly sealed segment.
    pub fn add_encrypted(&mut self, role: SegmentRole, pt_len: usize, ct_len: usize) {
        self.count_role(role);
        self.bytes_plaintext += pt_len as u64;
        self.bytes_ciphertext += ct_len as u64;
    }

    /// One segment reused from a previous run. Its plaintext was never read.
    pub fn add_resumed(&mut self, role: SegmentRole, ct_len: usize) {
        self.count_role(role);
        self.segments_resumed += 1;
        self.bytes_ciphertext += ct_len as u64;
    }

    /// One segment opened and authenticated.
    pub fn add_decrypted(&mut self, role: SegmentRole, ct_len: usize, pt_len: usize) {
        self.count_role(role);
        self.bytes_ciphertext += ct_len as u64;
        self.bytes_plaintext += pt_len as u64;
    }

    pub fn add_auth_failure(&mut self) {
        self.auth_failures += 1;
    }

    pub fn segments_total(&self) -> u64 {
        self.segments_media + self.segments_init
    }

    pub fn merge(&mut self, other: &TelemetryCounters) {
        self.segments_media += other.segments_media;
        self.segments_init += other.segments_init;
        self.segments_resumed += other.segments_resumed;
        self.bytes_plaintext += other.bytes_plaintext;
        self.bytes_ciphertext += other.bytes_ciphertext;
        self.auth_failures += other.auth_failures;
    }
}

impl AddAssign for TelemetryCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
