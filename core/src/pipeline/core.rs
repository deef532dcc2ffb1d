//! Stable entry points.

use std::path::Path;

use crate::crypto::Key;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::encrypt::{run_encrypt_pipeline, EncryptOutcome};
use crate::pipeline::parallelism::ParallelismProfile;
use crate::pipeline::reader::AssetReader;
use crate::segment::SegmentSource;
use crate::store::SegmentStore;
use crate::telemetry::TelemetrySnapshot;
use crate::types::StreamError;

/// Encrypt `source` into the asset directory `out_dir`.
///
/// On success the directory holds one ciphertext file per segment and
/// `manifest.json`, plus `aes_key.bin` when `config.persist_key` is set.
pub fn encrypt_asset(
    source: &dyn SegmentSource,
    out_dir: &Path,
    key: &Key,
    config: &PipelineConfig,
) -> Result<EncryptOutcome, StreamError> {
    let store = SegmentStore::create(out_dir)?;
    run_encrypt_pipeline(source, &store, key, config)
}

/// Decrypt a whole asset (init first, then chunks) into one buffer.
pub fn decrypt_asset(
    asset_dir: &Path,
    key: &Key,
    profile: &ParallelismProfile,
) -> Result<(Vec<u8>, TelemetrySnapshot), StreamError> {
    let reader = AssetReader::open(asset_dir, key)?;
    if profile.worker_count > 1 {
        reader.decrypt_all_parallel(profile)
    } else {
        reader.decrypt_all()
    }
}

/// Store consistency plus authentication of every segment.
pub fn verify_asset(asset_dir: &Path, key: &Key) -> Result<TelemetrySnapshot, StreamError> {
    AssetReader::open(asset_dir, key)?.verify_all()
}
