use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::INIT_FILENAME;
use crate::manifest::naming::{chunk_filename, segment_filename};

/// Role of a segment inside an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRole {
    /// Container initialisation data; at most one per asset, always first.
    Init,
    /// Independently playable media range.
    Media,
}

impl fmt::Display for SegmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentRole::Init => f.write_str("init"),
            SegmentRole::Media => f.write_str("media"),
        }
    }
}

/// Where a segment's bytes live before they are loaded.
#[derive(Debug, Clone)]
pub enum SegmentLocation {
    File(PathBuf),
    Range { path: PathBuf, offset: u64, len: usize },
    Memory(Bytes),
}

/// Cheap description of a segment, produced by a source before any bytes are read.
#[derive(Debug, Clone)]
pub struct SegmentDescriptor {
    /// Media index (0..N-1). Always 0 for the init segment.
    pub index: u32,
    pub role: SegmentRole,
    /// Name the segment had at the source (for logs and diagnostics).
    pub source_name: String,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub location: SegmentLocation,
}

impl SegmentDescriptor {
    /// Ciphertext filename this segment is stored under.
    pub fn output_filename(&self) -> String {
        match self.role {
            SegmentRole::Init => INIT_FILENAME.to_string(),
            SegmentRole::Media => segment_filename(self.index),
        }
    }
}

/// A loaded segment. Immutable once produced.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: u32,
    pub role: SegmentRole,
    pub source_name: String,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub bytes: Bytes,
}

impl Segment {
    pub fn media(index: u32, bytes: impl Into<Bytes>) -> Self {
        Self {
            index,
            role: SegmentRole::Media,
            source_name: segment_filename(index),
            start: None,
            duration: None,
            bytes: bytes.into(),
        }
    }

    pub fn init(bytes: impl Into<Bytes>) -> Self {
        Self {
            index: 0,
            role: SegmentRole::Init,
            source_name: INIT_FILENAME.to_string(),
            start: None,
            duration: None,
            bytes: bytes.into(),
        }
    }

    pub fn output_filename(&self) -> String {
        match self.role {
            SegmentRole::Init => INIT_FILENAME.to_string(),
            SegmentRole::Media => segment_filename(self.index),
        }
    }
}

/// One planned time range of the source media.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSpan {
    pub index: u32,
    pub start: f64,
    pub duration: f64,
}

impl SegmentSpan {
    /// Raw (pre-encryption) chunk name the external splitter should write, e.g. `chunk004.mp4`.
    pub fn filename(&self, ext: &str) -> String {
        chunk_filename(self.index, ext)
    }
}
