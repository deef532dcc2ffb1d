//! Existence and consistency checks.
//!
//! Both checks collect every offender before failing, so an operator sees
//! the whole list in one pass.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::manifest::naming::parse_segment_filename;
use crate::manifest::types::{InputManifest, Manifest};
use crate::types::StreamError;
use crate::utils::base_name;

/// Pre-encryption check. Logs every missing segment; `false` if any is missing.
pub fn validate(input: &InputManifest, source_dir: &Path) -> bool {
    match validate_report(input, source_dir) {
        Ok(()) => true,
        Err(StreamError::MissingSegment { missing }) => {
            for name in &missing {
                warn!(segment = %name, "missing segment");
            }
            false
        }
        Err(e) => {
            warn!(error = %e, "input manifest rejected");
            false
        }
    }
}

/// Like [`validate`], returning the full list of missing filenames.
pub fn validate_report(input: &InputManifest, source_dir: &Path) -> Result<(), StreamError> {
    if input.chunks.is_empty() {
        return Err(StreamError::Validation("input manifest lists no chunks".into()));
    }
    let missing: Vec<String> = input
        .init
        .iter()
        .chain(input.chunks.iter())
        .map(|e| base_name(&e.filename))
        .filter(|name| !source_dir.join(name).is_file())
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StreamError::MissingSegment { missing })
    }
}

/// Post-encryption check of an asset directory against its manifest.
///
/// The manifest must pass [`Manifest::check`], every referenced file must
/// exist, and the directory must hold exactly `chunks.len()` segment files.
pub fn verify_store(manifest: &Manifest, asset_dir: &Path) -> Result<(), StreamError> {
    manifest.check()?;

    let missing: Vec<String> = manifest
        .entries()
        .map(|e| base_name(&e.filename))
        .filter(|name| !asset_dir.join(name).is_file())
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(StreamError::MissingSegment { missing });
    }

    let on_disk = count_segment_files(asset_dir)?;
    if on_disk != manifest.chunks.len() {
        return Err(StreamError::ManifestCorrupt(format!(
            "manifest lists {} chunks but {} segment files are present",
            manifest.chunks.len(),
            on_disk
        )));
    }
    Ok(())
}

fn count_segment_files(dir: &Path) -> Result<usize, StreamError> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && parse_segment_filename(&entry.file_name().to_string_lossy()).is_some()
        {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Nonce, Tag};
    use crate::manifest::types::{InputEntry, ManifestEntry};

    fn entry(name: &str) -> ManifestEntry {
        ManifestEntry::new(name, &Nonce::from_bytes([1; 12]), &Tag::from_bytes([2; 16]))
    }

    #[test]
    fn reports_every_missing_input_chunk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("chunk001.mp4"), b"x").unwrap();
        let input = InputManifest {
            init: None,
            chunks: ["chunks/chunk000.mp4", "chunks/chunk001.mp4", "chunks/chunk002.mp4"]
                .into_iter()
                .map(InputEntry::named)
                .collect(),
        };
        assert!(!validate(&input, dir.path()));
        match validate_report(&input, dir.path()) {
            Err(StreamError::MissingSegment { missing }) => {
                assert_eq!(missing, vec!["chunk000.mp4", "chunk002.mp4"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_listing_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!validate(&InputManifest::default(), dir.path()));
    }

    #[test]
    fn store_check_counts_segment_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["chunk000.enc", "chunk001.enc", "chunk_init.enc", "manifest.json"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let mut m = Manifest {
            init: Some(entry("chunk_init.enc")),
            chunks: vec![entry("chunk000.enc"), entry("chunk001.enc")],
            cipher: Default::default(),
        };
        verify_store(&m, dir.path()).unwrap();

        // A stray extra segment file breaks the N ↔ N invariant.
        fs::write(dir.path().join("chunk002.enc"), b"x").unwrap();
        assert!(matches!(verify_store(&m, dir.path()), Err(StreamError::ManifestCorrupt(_))));

        m.chunks.push(entry("chunk002.enc"));
        let mut reordered = m.clone();
        reordered.chunks.swap(0, 1);
        assert!(matches!(verify_store(&reordered, dir.path()), Err(StreamError::ManifestCorrupt(_))));
        fs::remove_file(dir.path().join("chunk001.enc")).unwrap();
        match verify_store(&m, dir.path()) {
            Err(StreamError::MissingSegment { missing }) => assert_eq!(missing, vec!["chunk001.enc"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
