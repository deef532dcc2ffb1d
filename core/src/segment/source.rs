//! Segment sources.
//!
//! A source first enumerates cheap [`SegmentDescriptor`]s (init first, then
//! media in playback order) and the pipeline's reader stage loads the bytes
//! one segment at a time, so memory stays bounded by the in-flight window.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::constants::{MANIFEST_FILENAME, MAX_SEGMENT_SIZE};
use crate::manifest::types::InputManifest;
use crate::manifest::validate::validate_report;
use crate::segment::types::{Segment, SegmentDescriptor, SegmentLocation, SegmentRole};
use crate::types::StreamError;
use crate::utils::base_name;

/// Anything that can enumerate an asset's raw segments in order.
pub trait SegmentSource: Send + Sync {
    /// Descriptors in playback order: optional init first, then media 0..N-1.
    fn enumerate(&self) -> Result<Vec<SegmentDescriptor>, StreamError>;
}

impl SegmentDescriptor {
    /// Read this segment's bytes.
    pub fn load(&self) -> Result<Segment, StreamError> {
        let bytes = match &self.location {
            SegmentLocation::File(path) => Bytes::from(fs::read(path).map_err(|e| {
                StreamError::SourceUnavailable(format!("{}: {e}", path.display()))
            })?),
            SegmentLocation::Range { path, offset, len } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(*offset))?;
                let mut buf = vec![0u8; *len];
                file.read_exact(&mut buf)?;
                Bytes::from(buf)
            }
            SegmentLocation::Memory(b) => b.clone(),
        };

        Ok(Segment {
            index: self.index,
            role: self.role,
            source_name: self.source_name.clone(),
            start: self.start,
            duration: self.duration,
            bytes,
        })
    }
}

// ============================================================
// Listed source (input manifest written by the splitter)
// ============================================================

/// Raw chunks pre-enumerated by `<dir>/manifest.json`.
#[derive(Debug, Clone)]
pub struct ListedSource {
    dir: PathBuf,
    manifest: InputManifest,
}

impl ListedSource {
    /// Load `<dir>/manifest.json`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let dir = dir.into();
        let path = dir.join(MANIFEST_FILENAME);
        let raw = fs::read(&path).map_err(|e| {
            StreamError::SourceUnavailable(format!("input manifest {}: {e}", path.display()))
        })?;
        let manifest: InputManifest = serde_json::from_slice(&raw)
            .map_err(|e| StreamError::ManifestCorrupt(format!("input manifest: {e}")))?;
        Ok(Self { dir, manifest })
    }

    pub fn from_manifest(dir: impl Into<PathBuf>, manifest: InputManifest) -> Self {
        Self { dir: dir.into(), manifest }
    }

    pub fn manifest(&self) -> &InputManifest {
        &self.manifest
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SegmentSource for ListedSource {
    fn enumerate(&self) -> Result<Vec<SegmentDescriptor>, StreamError> {
        // Every missing chunk is reported before anything is encrypted.
        validate_report(&self.manifest, &self.dir)?;

        let mut out = Vec::with_capacity(self.manifest.chunks.len() + 1);
        if let Some(init) = &self.manifest.init {
            let name = base_name(&init.filename).to_string();
            out.push(SegmentDescriptor {
                index: 0,
                role: SegmentRole::Init,
                location: SegmentLocation::File(self.dir.join(&name)),
                source_name: name,
                start: None,
                duration: None,
            });
        }
        for (i, entry) in self.manifest.chunks.iter().enumerate() {
            let name = base_name(&entry.filename).to_string();
            out.push(SegmentDescriptor {
                index: i as u32,
                role: SegmentRole::Media,
                location: SegmentLocation::File(self.dir.join(&name)),
                source_name: name,
                start: entry.start,
                duration: entry.duration,
            });
        }
        Ok(out)
    }
}

// ============================================================
// Fragmented container directory (init.mp4 + *.m4s)
// ============================================================

/// Directory produced by a fragmented-MP4 packager.
///
/// The single `*init.mp4` is the init segment. `*.m4s` files are media,
/// ordered by their trailing number (`segment_2` before `segment_10`), then
/// by name.
#[derive(Debug, Clone)]
pub struct FragmentedDirSource {
    dir: PathBuf,
}

impl FragmentedDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn trailing_number(name: &str) -> Option<u64> {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

impl SegmentSource for FragmentedDirSource {
    fn enumerate(&self) -> Result<Vec<SegmentDescriptor>, StreamError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            StreamError::SourceUnavailable(format!("{}: {e}", self.dir.display()))
        })?;

        let mut inits = Vec::new();
        let mut media = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with("init.mp4") {
                inits.push(name);
            } else if name.ends_with(".m4s") {
                media.push(name);
            }
        }

        if inits.len() > 1 {
            inits.sort();
            return Err(StreamError::SourceUnavailable(format!(
                "more than one init segment: {}",
                inits.join(", ")
            )));
        }
        if media.is_empty() {
            return Err(StreamError::SourceUnavailable(format!(
                "no .m4s media segments in {}",
                self.dir.display()
            )));
        }
        media.sort_by(|a, b| (trailing_number(a), a).cmp(&(trailing_number(b), b)));
        debug!(init = inits.len(), media = media.len(), "fragmented segments found");

        let mut out = Vec::with_capacity(media.len() + 1);
        if let Some(name) = inits.pop() {
            out.push(SegmentDescriptor {
                index: 0,
                role: SegmentRole::Init,
                location: SegmentLocation::File(self.dir.join(&name)),
                source_name: name,
                start: None,
                duration: None,
            });
        }
        for (i, name) in media.into_iter().enumerate() {
            out.push(SegmentDescriptor {
                index: i as u32,
                role: SegmentRole::Media,
                location: SegmentLocation::File(self.dir.join(&name)),
                source_name: name,
                start: None,
                duration: None,
            });
        }
        Ok(out)
    }
}

// ============================================================
// Direct byte split of one file
// ============================================================

/// Splits one file into `segment_size`-byte ranges; the last may be shorter.
#[derive(Debug, Clone)]
pub struct FixedSizeSource {
    path: PathBuf,
    segment_size: usize,
}

impl FixedSizeSource {
    pub fn new(path: impl Into<PathBuf>, segment_size: usize) -> Result<Self, StreamError> {
        if segment_size == 0 || segment_size > MAX_SEGMENT_SIZE {
            return Err(StreamError::Validation(format!(
                "segment size {segment_size} outside 1..={MAX_SEGMENT_SIZE}"
            )));
        }
        Ok(Self { path: path.into(), segment_size })
    }
}

impl SegmentSource for FixedSizeSource {
    fn enumerate(&self) -> Result<Vec<SegmentDescriptor>, StreamError> {
        let total = fs::metadata(&self.path)
            .map_err(|e| StreamError::SourceUnavailable(format!("{}: {e}", self.path.display())))?
            .len();
        if total == 0 {
            return Err(StreamError::SourceUnavailable(format!(
                "{} is empty",
                self.path.display()
            )));
        }

        let name = self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let size = self.segment_size as u64;
        let count = total.div_ceil(size);

        Ok((0..count)
            .map(|i| {
                let offset = i * size;
                let len = size.min(total - offset) as usize;
                SegmentDescriptor {
                    index: i as u32,
                    role: SegmentRole::Media,
                    source_name: format!("{name}@{offset}"),
                    start: None,
                    duration: None,
                    location: SegmentLocation::Range { path: self.path.clone(), offset, len },
                }
            })
            .collect())
    }
}

// ============================================================
// In-memory source
// ============================================================

/// Segments already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    init: Option<Bytes>,
    media: Vec<Bytes>,
}

impl MemorySource {
    pub fn new(init: Option<Bytes>, media: Vec<Bytes>) -> Self {
        Self { init, media }
    }

    pub fn media_only<I, B>(media: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self { init: None, media: media.into_iter().map(Into::into).collect() }
    }
}

impl SegmentSource for MemorySource {
    fn enumerate(&self) -> Result<Vec<SegmentDescriptor>, StreamError> {
        let mut out = Vec::with_capacity(self.media.len() + 1);
        if let Some(init) = &self.init {
            out.push(SegmentDescriptor {
                index: 0,
                role: SegmentRole::Init,
                source_name: "init".into(),
                start: None,
                duration: None,
                location: SegmentLocation::Memory(init.clone()),
            });
        }
        for (i, bytes) in self.media.iter().enumerate() {
            out.push(SegmentDescriptor {
                index: i as u32,
                role: SegmentRole::Media,
                source_name: format!("memory#{i}"),
                start: None,
                duration: None,
                location: SegmentLocation::Memory(bytes.clone()),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_numbers_sort_naturally() {
        assert_eq!(trailing_number("segment_10.m4s"), Some(10));
        assert_eq!(trailing_number("segment_2.m4s"), Some(2));
        assert_eq!(trailing_number("foo.m4s"), None);
    }

    #[test]
    fn fragmented_dir_puts_init_first_and_orders_media() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["segment_10.m4s", "segment_2.m4s", "segment_1.m4s", "video_init.mp4", "stream.mpd"] {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        let descs = FragmentedDirSource::new(dir.path()).enumerate().unwrap();
        let names: Vec<_> = descs.iter().map(|d| d.source_name.as_str()).collect();
        assert_eq!(names, vec!["video_init.mp4", "segment_1.m4s", "segment_2.m4s", "segment_10.m4s"]);
        assert_eq!(descs[0].role, SegmentRole::Init);
        assert_eq!(descs[0].output_filename(), "chunk_init.enc");
        assert_eq!(descs[3].output_filename(), "chunk002.enc");
    }

    #[test]
    fn fragmented_dir_without_media_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("init.mp4"), b"x").unwrap();
        let err = FragmentedDirSource::new(dir.path()).enumerate().unwrap_err();
        assert!(matches!(err, StreamError::SourceUnavailable(_)));
    }

    #[test]
    fn fixed_size_split_keeps_short_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.bin");
        let data: Vec<u8> = (0..2400u32).map(|i| i as u8).collect();
        fs::write(&path, &data).unwrap();

        let descs = FixedSizeSource::new(&path, 1000).unwrap().enumerate().unwrap();
        let lens: Vec<usize> = descs.iter().map(|d| d.load().unwrap().bytes.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 400]);
        assert_eq!(&descs[2].load().unwrap().bytes[..], &data[2000..]);
    }

    #[test]
    fn fixed_size_rejects_empty_file_and_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();
        assert!(FixedSizeSource::new(&path, 0).is_err());
        let err = FixedSizeSource::new(&path, 10).unwrap().enumerate().unwrap_err();
        assert!(matches!(err, StreamError::SourceUnavailable(_)));
    }
}
