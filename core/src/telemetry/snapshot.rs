use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::TelemetryCounters;
use crate::telemetry::timers::{Stage, StageTimes, TelemetryTimer};

/// Immutable telemetry for one pipeline call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub segments_media: u64,
    pub segments_init: u64,
    pub segments_resumed: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
    pub auth_failures: u64,
    pub throughput_plaintext_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl TelemetrySnapshot {
    pub fn from(counters: &TelemetryCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_plaintext as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            segments_media: counters.segments_media,
            segments_init: counters.segments_init,
            segments_resumed: counters.segments_resumed,
            bytes_plaintext: counters.bytes_plaintext,
            bytes_ciphertext: counters.bytes_ciphertext,
            auth_failures: counters.auth_failures,
            throughput_plaintext_bytes_per_sec: throughput,
            elapsed,
            stage_times: timer.stage_times.clone(),
        }
    }

    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    pub fn has_all_stages(&self, expected: &[Stage]) -> bool {
        self.stage_times.has_all(expected)
    }

    /// Segments handled in this call, resumed ones included.
    pub fn segments_total(&self) -> u64 {
        self.segments_media + self.segments_init
    }

    /// Internal invariants that hold for every run.
    pub fn sanity_check(&self) -> bool {
        self.segments_resumed <= self.segments_total()
            && (self.segments_resumed > 0 || self.bytes_ciphertext == self.bytes_plaintext)
    }
}
