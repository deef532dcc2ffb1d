//! Client-side access to an encrypted asset.
//!
//! The reader loads the manifest once and then opens segments by index. It
//! never hands out plaintext that did not authenticate.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::crypto::{Credentials, Key, KeyProvider};
use crate::manifest::{verify_store, Manifest, ManifestEntry};
use crate::pipeline::parallelism::ParallelismProfile;
use crate::segment::SegmentRole;
use crate::store::SegmentStore;
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::StreamError;
use crate::utils::segments_to_plaintext;
use crate::worker::{decrypt_segment_with, DecryptSegmentInput, DecryptSegmentWorker, DecryptedSegment, SegmentCryptoContext};

pub struct AssetReader {
    store: SegmentStore,
    manifest: Manifest,
    crypto: SegmentCryptoContext,
}

impl fmt::Debug for AssetReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetReader")
            .field("store", &self.store)
            .field("manifest", &self.manifest)
            .field("cipher", &self.crypto.suite())
            .finish()
    }
}

impl AssetReader {
    /// Open `dir` and load its manifest. The cipher comes from the manifest.
    pub fn open(dir: impl Into<PathBuf>, key: &Key) -> Result<Self, StreamError> {
        let store = SegmentStore::open(dir)?;
        let manifest = store.read_manifest()?;
        let crypto = SegmentCryptoContext::new(manifest.cipher, key)?;
        debug!(chunks = manifest.chunks.len(), init = manifest.init.is_some(), "asset opened");
        Ok(Self { store, manifest, crypto })
    }

    /// Open an asset under `root/<asset_id>` with a key from `provider`.
    pub fn open_with_provider(
        root: impl Into<PathBuf>,
        asset_id: &str,
        provider: &dyn KeyProvider,
        credentials: &Credentials,
    ) -> Result<Self, StreamError> {
        let key = provider.fetch_key(asset_id, credentials)?;
        Self::open(root.into().join(asset_id), &key)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Number of media segments.
    pub fn len(&self) -> usize {
        self.manifest.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.chunks.is_empty()
    }

    pub fn has_init(&self) -> bool {
        self.manifest.init.is_some()
    }

    /// Store consistency: all files present, one file per chunk.
    pub fn verify_store(&self) -> Result<(), StreamError> {
        verify_store(&self.manifest, self.store.dir())
    }

    pub fn decrypt_init(&self) -> Result<Option<Bytes>, StreamError> {
        self.manifest.init.as_ref().map(|e| self.open_entry(e)).transpose()
    }

    /// Decrypt media segment `index`.
    pub fn decrypt_segment(&self, index: usize) -> Result<Bytes, StreamError> {
        let entry = self.manifest.chunks.get(index).ok_or_else(|| {
            StreamError::Validation(format!("segment {index} out of range ({} chunks)", self.len()))
        })?;
        self.open_entry(entry)
    }

    fn open_entry(&self, entry: &ManifestEntry) -> Result<Bytes, StreamError> {
        let nonce = entry.nonce()?;
        let tag = entry.tag()?;
        let ciphertext = self.store.read_segment(&entry.filename)?;
        let plaintext = decrypt_segment_with(&self.crypto.aead, &ciphertext, &nonce, &tag)
            .map_err(|e| e.for_segment(&entry.filename))?;
        Ok(Bytes::from(plaintext))
    }

    /// Init followed by every chunk, decrypted one after another. The store
    /// is checked first, so every missing file is named in one error.
    pub fn decrypt_all(&self) -> Result<(Vec<u8>, TelemetrySnapshot), StreamError> {
        let mut timer = TelemetryTimer::new();
        let mut counters = TelemetryCounters::default();

        let start = Instant::now();
        self.verify_store()?;
        timer.add_stage_time(Stage::Validate, start.elapsed());
        let mut parts = Vec::with_capacity(self.len() + 1);

        for (role, entry) in self.entries() {
            let start = Instant::now();
            let part = self.open_entry(entry)?;
            timer.add_stage_time(Stage::Decrypt, start.elapsed());
            counters.add_decrypted(role, part.len(), part.len());
            parts.push(part);
        }

        timer.finish();
        Ok((segments_to_plaintext(&parts), TelemetrySnapshot::from(&counters, &timer)))
    }

    /// Like [`decrypt_all`](Self::decrypt_all), fanned out over a worker pool.
    /// Any single failure fails the call and no plaintext is returned.
    pub fn decrypt_all_parallel(
        &self,
        profile: &ParallelismProfile,
    ) -> Result<(Vec<u8>, TelemetrySnapshot), StreamError> {
        let mut timer = TelemetryTimer::new();
        let mut counters = TelemetryCounters::default();

        let start = Instant::now();
        self.verify_store()?;
        timer.add_stage_time(Stage::Validate, start.elapsed());

        let entries: Vec<(SegmentRole, &ManifestEntry)> = self.entries().collect();
        let expected = entries.len();

        let (in_tx, in_rx) = bounded::<DecryptSegmentInput>(profile.queue_cap());
        let (out_tx, out_rx) = bounded::<Result<DecryptedSegment, StreamError>>(profile.queue_cap());

        let (read_result, gathered) = thread::scope(|scope| {
            let reader = scope.spawn(move || self.feed(entries, in_tx));

            for _ in 0..profile.worker_count {
                let worker = DecryptSegmentWorker::new(self.crypto.clone());
                let rx = in_rx.clone();
                let tx = out_tx.clone();
                scope.spawn(move || worker.run(rx, tx));
            }
            drop(in_rx);
            drop(out_tx);

            let gathered = gather(out_rx, expected);
            let read = reader
                .join()
                .unwrap_or(Err(StreamError::Pipeline("segment reader panicked")));
            (read, gathered)
        });

        let segments = gathered?;
        read_result?;
        if segments.len() != expected {
            return Err(StreamError::Pipeline("decrypt pipeline ended before every segment was opened"));
        }

        for seg in &segments {
            counters.add_decrypted(seg.role, seg.ciphertext_len, seg.plaintext.len());
            timer.stage_times.merge(&seg.stage_times);
        }
        let parts: Vec<&[u8]> = segments.iter().map(|s| s.plaintext.as_ref()).collect();
        let plaintext = segments_to_plaintext(&parts);
        timer.finish();
        Ok((plaintext, TelemetrySnapshot::from(&counters, &timer)))
    }

    /// Authenticate every segment without keeping plaintext. All failing
    /// segments are reported together.
    pub fn verify_all(&self) -> Result<TelemetrySnapshot, StreamError> {
        let mut timer = TelemetryTimer::new();
        let mut counters = TelemetryCounters::default();

        let start = Instant::now();
        self.verify_store()?;
        timer.add_stage_time(Stage::Validate, start.elapsed());

        let mut failed = Vec::new();
        for (role, entry) in self.entries() {
            let start = Instant::now();
            match self.open_entry(entry) {
                Ok(plaintext) => counters.add_decrypted(role, plaintext.len(), plaintext.len()),
                Err(e) if e.is_authentication_failure() => {
                    warn!(segment = %entry.filename, "segment failed authentication");
                    counters.add_auth_failure();
                    failed.push(entry.filename.clone());
                }
                Err(e) => return Err(e),
            }
            timer.add_stage_time(Stage::Decrypt, start.elapsed());
        }

        if !failed.is_empty() {
            return Err(StreamError::AuthenticationFailure { segment: failed.join(", ") });
        }
        timer.finish();
        info!(segments = counters.segments_total(), "asset verified");
        Ok(TelemetrySnapshot::from(&counters, &timer))
    }

    fn entries(&self) -> impl Iterator<Item = (SegmentRole, &ManifestEntry)> {
        self.manifest
            .init
            .iter()
            .map(|e| (SegmentRole::Init, e))
            .chain(self.manifest.chunks.iter().map(|e| (SegmentRole::Media, e)))
    }

    fn feed(&self, entries: Vec<(SegmentRole, &ManifestEntry)>, tx: Sender<DecryptSegmentInput>) -> Result<(), StreamError> {
        for (slot, (role, entry)) in entries.into_iter().enumerate() {
            let input = DecryptSegmentInput {
                slot,
                role,
                filename: entry.filename.clone(),
                nonce: entry.nonce()?,
                tag: entry.tag()?,
                ciphertext: self.store.read_segment(&entry.filename)?,
            };
            if tx.send(input).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Collect results back into slot order. The first error wins.
fn gather(
    rx: Receiver<Result<DecryptedSegment, StreamError>>,
    expected: usize,
) -> Result<Vec<DecryptedSegment>, StreamError> {
    let mut by_slot = BTreeMap::new();
    for result in rx.iter() {
        let seg = result?;
        by_slot.insert(seg.slot, seg);
        if by_slot.len() == expected {
            break;
        }
    }
    Ok(by_slot.into_values().collect())
}
