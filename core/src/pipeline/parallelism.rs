use tracing::debug;

use crate::constants::QUEUE_DEPTH_PER_WORKER;

/// Worker count and how many segments may be in flight at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelismProfile {
    pub worker_count: usize,
    pub inflight_segments: usize,
}

impl ParallelismProfile {
    pub fn single_threaded() -> Self {
        Self {
            worker_count: 1,
            inflight_segments: 1,
        }
    }

    pub fn fixed(workers: usize) -> Self {
        let worker_count = workers.max(1);
        Self {
            worker_count,
            inflight_segments: worker_count * QUEUE_DEPTH_PER_WORKER,
        }
    }

    /// Size from the machine: one core is left free, and the in-flight window
    /// is capped by `mem_fraction` of available memory over `max_segment_size`.
    pub fn dynamic(max_segment_size: u64, mem_fraction: f64, hard_cap: usize) -> Self {
        let cores = num_cpus::get();
        let worker_count = cores.saturating_sub(1).max(1);

        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let avail_bytes = sys.available_memory();

        let budget = (avail_bytes as f64 * mem_fraction.clamp(0.0, 1.0)) as u64;
        let max_segments = budget / max_segment_size.max(1);

        let inflight_segments = (max_segments.min(hard_cap as u64) as usize).max(worker_count);
        debug!(worker_count, inflight_segments, avail_bytes, "parallelism profile");

        Self {
            worker_count,
            inflight_segments,
        }
    }

    /// Bounded channel capacity between stages.
    pub fn queue_cap(&self) -> usize {
        self.inflight_segments.max(1)
    }
}

impl Default for ParallelismProfile {
    fn default() -> Self {
        Self::single_threaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_never_drops_to_zero_workers() {
        let p = ParallelismProfile::fixed(0);
        assert_eq!(p.worker_count, 1);
        assert_eq!(p.inflight_segments, QUEUE_DEPTH_PER_WORKER);
    }

    #[test]
    fn dynamic_has_room_for_every_worker() {
        let p = ParallelismProfile::dynamic(1024 * 1024, 0.5, 64);
        assert!(p.worker_count >= 1);
        assert!(p.inflight_segments >= p.worker_count);
    }
}
