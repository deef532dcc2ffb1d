//! Encrypt pipeline.
//!
//! ```text
//! reader ──bounded──▶ workers (N) ──bounded──▶ ordered committer
//!                                               store → journal → builder
//! ```
//!
//! Workers finish in any order; the committer holds results in a reorder
//! buffer and commits strictly in source order, so the manifest order equals
//! the source order whatever the worker count.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use crate::crypto::{Key, NonceRegistry};
use crate::manifest::{verify_store, EntryDraft, Manifest, ManifestBuilder};
use crate::pipeline::config::{CommitEvent, PipelineConfig};
use crate::recovery::{usable_records, JournalRecord, ResumeSet, RunJournal};
use crate::segment::{SegmentDescriptor, SegmentRole, SegmentSource};
use crate::store::SegmentStore;
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::StreamError;
use crate::worker::{EncryptSegmentInput, EncryptSegmentWorker, EncryptedSegment, SegmentCryptoContext};

/// Result of a completed encrypt run.
#[derive(Debug, Clone)]
pub struct EncryptOutcome {
    pub manifest: Manifest,
    pub telemetry: TelemetrySnapshot,
}

/// Encrypt every segment of `source` into `store` and write the manifest last.
pub fn run_encrypt_pipeline(
    source: &dyn SegmentSource,
    store: &SegmentStore,
    key: &Key,
    config: &PipelineConfig,
) -> Result<EncryptOutcome, StreamError> {
    let mut timer = TelemetryTimer::new();

    let start = Instant::now();
    let descriptors = source.enumerate()?;
    let media_count = check_layout(&descriptors)?;
    let has_init = descriptors.first().is_some_and(|d| d.role == SegmentRole::Init);
    timer.add_stage_time(Stage::Validate, start.elapsed());

    info!(
        dir = %store.dir().display(),
        media = media_count,
        init = has_init,
        cipher = %config.cipher,
        workers = config.profile.worker_count,
        "encrypt run starting"
    );

    let (journal, resumable) = if config.resume {
        let (journal, records) = RunJournal::resume(store.dir(), key, config.cipher)?;
        (journal, usable_records(records, store))
    } else {
        (RunJournal::create(store.dir(), key, config.cipher)?, ResumeSet::new())
    };

    store.sweep_tmp()?;
    if store.remove_manifest()? {
        debug!("previous manifest removed");
    }
    if config.persist_key {
        store.write_key(key)?;
    }

    let mut builder = ManifestBuilder::new(config.cipher);
    builder.reserve(media_count);

    let mut committer = OrderedCommitter {
        store,
        config,
        journal,
        builder,
        nonces: NonceRegistry::new(),
        counters: TelemetryCounters::default(),
        timer,
        committed: 0,
        total: descriptors.len(),
    };

    // Segments journaled by an aborted run keep their ciphertext and nonce.
    let mut work = Vec::with_capacity(descriptors.len());
    for desc in descriptors {
        match resumable.get(&(desc.role, desc.index)) {
            Some(rec) if rec.filename == desc.output_filename() => committer.adopt(&desc, rec)?,
            _ => work.push(desc),
        }
    }
    if committer.committed > 0 {
        info!(resumed = committer.committed, remaining = work.len(), "resuming from journal");
    }

    let crypto = SegmentCryptoContext::new(config.cipher, key)?;
    let profile = &config.profile;
    let cancel: &AtomicBool = &config.cancel;
    let expected = work.len();

    let (seg_tx, seg_rx) = bounded::<EncryptSegmentInput>(profile.queue_cap());
    let (out_tx, out_rx) = bounded::<Result<EncryptedSegment, StreamError>>(profile.queue_cap());

    let (read_result, write_result) = thread::scope(|scope| {
        let reader = scope.spawn(move || read_segments(work, seg_tx, cancel));

        for _ in 0..profile.worker_count {
            let worker = EncryptSegmentWorker::new(crypto.clone());
            let rx = seg_rx.clone();
            let tx = out_tx.clone();
            scope.spawn(move || worker.run(rx, tx, cancel));
        }
        drop(seg_rx);
        drop(out_tx);

        let written = committer.drain(out_rx);
        let read = reader
            .join()
            .unwrap_or(Err(StreamError::Pipeline("segment reader panicked")));
        (read, written)
    });

    let written = write_result?;
    let read_time = read_result?;
    committer.timer.add_stage_time(Stage::Read, read_time);
    if written < expected {
        return Err(if cancel.load(Ordering::Relaxed) {
            StreamError::Cancelled
        } else {
            StreamError::Pipeline("encrypt pipeline ended before every segment was committed")
        });
    }

    let OrderedCommitter { journal, builder, counters, mut timer, .. } = committer;

    store.prune_segments(media_count, has_init)?;
    let manifest = builder.finalize()?;

    let start = Instant::now();
    verify_store(&manifest, store.dir())?;
    timer.add_stage_time(Stage::Validate, start.elapsed());

    store.write_manifest(&manifest)?;
    journal.finish()?;
    timer.finish();

    let telemetry = TelemetrySnapshot::from(&counters, &timer);
    info!(
        segments = telemetry.segments_total(),
        resumed = telemetry.segments_resumed,
        bytes = telemetry.bytes_plaintext,
        elapsed_ms = telemetry.elapsed.as_millis() as u64,
        "encrypt run complete"
    );
    Ok(EncryptOutcome { manifest, telemetry })
}

/// Init (if any) must come first and alone; media indices run 0..N-1.
fn check_layout(descriptors: &[SegmentDescriptor]) -> Result<usize, StreamError> {
    let inits: Vec<usize> = descriptors
        .iter()
        .enumerate()
        .filter(|(_, d)| d.role == SegmentRole::Init)
        .map(|(pos, _)| pos)
        .collect();
    match inits.as_slice() {
        [] | [0] => {}
        _ => {
            return Err(StreamError::SourceUnavailable(format!(
                "init segment must be single and first (found at positions {inits:?})"
            )))
        }
    }

    let media: Vec<u32> = descriptors
        .iter()
        .filter(|d| d.role == SegmentRole::Media)
        .map(|d| d.index)
        .collect();
    if media.is_empty() {
        return Err(StreamError::SourceUnavailable("source has no media segments".into()));
    }
    if media.iter().enumerate().any(|(i, &index)| index as usize != i) {
        return Err(StreamError::Validation("media segment indices are not 0..N-1 in order".into()));
    }
    Ok(media.len())
}

fn read_segments(
    work: Vec<SegmentDescriptor>,
    tx: Sender<EncryptSegmentInput>,
    cancel: &AtomicBool,
) -> Result<Duration, StreamError> {
    let mut spent = Duration::ZERO;
    for (slot, desc) in work.into_iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            debug!(slot, "reader stopping: cancelled");
            break;
        }
        let start = Instant::now();
        let segment = desc.load()?;
        spent += start.elapsed();

        if tx.send(EncryptSegmentInput { slot, segment }).is_err() {
            // Downstream already failed and reports the cause.
            break;
        }
    }
    Ok(spent)
}

/// Writer stage. Owns everything that must see segments in order.
struct OrderedCommitter<'a> {
    store: &'a SegmentStore,
    config: &'a PipelineConfig,
    journal: RunJournal,
    builder: ManifestBuilder,
    nonces: NonceRegistry,
    counters: TelemetryCounters,
    timer: TelemetryTimer,
    committed: usize,
    total: usize,
}

impl OrderedCommitter<'_> {
    /// Commit results in slot order. Returns how many work items were committed.
    fn drain(&mut self, rx: Receiver<Result<EncryptedSegment, StreamError>>) -> Result<usize, StreamError> {
        let mut pending: BTreeMap<usize, EncryptedSegment> = BTreeMap::new();
        let mut next = 0usize;

        for result in rx.iter() {
            let segment = result?;
            pending.insert(segment.slot, segment);

            while let Some(segment) = pending.remove(&next) {
                if self.config.is_cancelled() {
                    return Err(StreamError::Cancelled);
                }
                self.commit(segment)?;
                next += 1;
            }
        }
        Ok(next)
    }

    fn commit(&mut self, seg: EncryptedSegment) -> Result<(), StreamError> {
        self.nonces.register(seg.nonce)?;

        let start = Instant::now();
        self.store.write_segment(&seg.filename, &seg.ciphertext)?;
        let record = JournalRecord::new(
            seg.role,
            seg.index,
            &seg.filename,
            &seg.nonce,
            &seg.tag,
            seg.ciphertext.len() as u64,
        )
        .with_timing(seg.start, seg.duration);
        self.journal.append(&record)?;
        self.timer.add_stage_time(Stage::Write, start.elapsed());

        let draft = EntryDraft::new(seg.filename.clone(), seg.nonce, seg.tag).with_timing(seg.start, seg.duration);
        self.fill(seg.role, seg.index, draft)?;

        self.counters.add_encrypted(seg.role, seg.plaintext_len, seg.ciphertext.len());
        self.timer.stage_times.merge(&seg.stage_times);
        self.finish_one(seg.filename, false);
        Ok(())
    }

    /// Take over a segment journaled by an earlier run.
    fn adopt(&mut self, desc: &SegmentDescriptor, rec: &JournalRecord) -> Result<(), StreamError> {
        let nonce = rec.nonce()?;
        let tag = rec.tag()?;
        self.nonces.register(nonce)?;

        let draft = EntryDraft::new(rec.filename.clone(), nonce, tag).with_timing(desc.start, desc.duration);
        self.fill(desc.role, desc.index, draft)?;
        self.counters.add_resumed(desc.role, rec.len as usize);
        self.finish_one(rec.filename.clone(), true);
        Ok(())
    }

    fn fill(&mut self, role: SegmentRole, index: u32, draft: EntryDraft) -> Result<(), StreamError> {
        match role {
            SegmentRole::Init => {
                self.builder.set_init(draft);
                Ok(())
            }
            SegmentRole::Media => self.builder.set_media(index as usize, draft),
        }
    }

    fn finish_one(&mut self, filename: String, resumed: bool) {
        self.committed += 1;
        self.config.notify(&CommitEvent {
            committed: self.committed,
            total: self.total,
            filename,
            resumed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::MemorySource;
    use bytes::Bytes;

    #[test]
    fn layout_rejects_misplaced_init() {
        let src = MemorySource::new(Some(Bytes::from_static(b"init")), vec![Bytes::from_static(b"a")]);
        let mut descs = src.enumerate().unwrap();
        assert_eq!(check_layout(&descs).unwrap(), 1);
        descs.swap(0, 1);
        assert!(matches!(check_layout(&descs), Err(StreamError::SourceUnavailable(_))));
    }

    #[test]
    fn layout_requires_media() {
        let src = MemorySource::new(Some(Bytes::from_static(b"init")), vec![]);
        let descs = src.enumerate().unwrap();
        assert!(matches!(check_layout(&descs), Err(StreamError::SourceUnavailable(_))));
    }

    #[test]
    fn cancelled_before_start_writes_no_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::create(dir.path()).unwrap();
        let config = PipelineConfig::default().with_persist_key(false);
        config.cancel_handle().store(true, Ordering::Relaxed);
        let src = MemorySource::media_only(vec![vec![1u8; 10], vec![2u8; 10]]);
        let err = run_encrypt_pipeline(&src, &store, &Key::from_bytes([1; 32]), &config).unwrap_err();
        assert!(matches!(err, StreamError::Cancelled));
        assert!(!store.has_manifest());
    }
}
