//! Index ↔ filename mapping shared by the builder, the store and the validator.
//!
//! This is the only join key between manifest entries and files on disk, so
//! it lives in exactly one place.

use crate::constants::{INIT_FILENAME, SEGMENT_EXT, SEGMENT_PREFIX};

/// `chunk004.<ext>`. Raw splitter output and encrypted segments share the stem.
pub fn chunk_filename(index: u32, ext: &str) -> String {
    format!("{SEGMENT_PREFIX}{index:03}.{ext}")
}

/// `chunk000.enc`, `chunk001.enc`, ... Indices above 999 simply widen.
pub fn segment_filename(index: u32) -> String {
    chunk_filename(index, SEGMENT_EXT)
}

/// Inverse of [`segment_filename`]; `None` for anything else (including the init file).
pub fn parse_segment_filename(name: &str) -> Option<u32> {
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_EXT)?
        .strip_suffix('.')?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u32 = digits.parse().ok()?;
    // Reject non-canonical spellings such as chunk0001.enc.
    (segment_filename(index) == name).then_some(index)
}

pub fn is_init_filename(name: &str) -> bool {
    name == INIT_FILENAME
}
