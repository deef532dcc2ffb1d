//! Manifest accumulation.
//!
//! Entries either append in call order (`add_entry`) or fill slots reserved
//! up front (`reserve` + `set_media`) so an out-of-order gather can commit by
//! index. `finalize` refuses to produce a manifest with any hole in it.

use tracing::warn;

use crate::constants::INIT_FILENAME;
use crate::crypto::{CipherSuite, Nonce, Tag};
use crate::manifest::naming::segment_filename;
use crate::manifest::types::{Manifest, ManifestEntry};
use crate::segment::{Segment, SegmentRole};
use crate::types::StreamError;

/// A manifest entry that may still be missing its crypto material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    pub filename: String,
    pub nonce: Option<Nonce>,
    pub tag: Option<Tag>,
    pub start: Option<f64>,
    pub duration: Option<f64>,
}

impl EntryDraft {
    pub fn new(filename: impl Into<String>, nonce: Nonce, tag: Tag) -> Self {
        Self {
            filename: filename.into(),
            nonce: Some(nonce),
            tag: Some(tag),
            start: None,
            duration: None,
        }
    }

    /// Draft for an encrypted segment, carrying its timing metadata.
    pub fn for_segment(segment: &Segment, nonce: Nonce, tag: Tag) -> Self {
        Self {
            filename: segment.output_filename(),
            nonce: Some(nonce),
            tag: Some(tag),
            start: segment.start,
            duration: segment.duration,
        }
    }

    pub fn with_timing(mut self, start: Option<f64>, duration: Option<f64>) -> Self {
        self.start = start;
        self.duration = duration;
        self
    }

    fn finish(self) -> Result<ManifestEntry, String> {
        match (self.nonce, self.tag) {
            (Some(nonce), Some(tag)) => Ok(ManifestEntry {
                iv: nonce.to_hex(),
                tag: tag.to_hex(),
                filename: self.filename,
                start: self.start,
                duration: self.duration,
            }),
            (None, Some(_)) => Err(format!("{} (no iv)", self.filename)),
            (Some(_), None) => Err(format!("{} (no tag)", self.filename)),
            (None, None) => Err(format!("{} (no iv, no tag)", self.filename)),
        }
    }
}

#[derive(Debug, Default)]
pub struct ManifestBuilder {
    cipher: CipherSuite,
    init: Option<EntryDraft>,
    media: Vec<EntryDraft>,
}

impl ManifestBuilder {
    pub fn new(cipher: CipherSuite) -> Self {
        Self { cipher, init: None, media: Vec::new() }
    }

    /// Append (media) or set (init) an entry. A second init replaces the first.
    pub fn add_entry(&mut self, role: SegmentRole, draft: EntryDraft) {
        match role {
            SegmentRole::Init => self.set_init(draft),
            SegmentRole::Media => self.media.push(draft),
        }
    }

    pub fn set_init(&mut self, draft: EntryDraft) {
        if let Some(prev) = &self.init {
            warn!(previous = %prev.filename, replacement = %draft.filename, "init entry overwritten");
        }
        self.init = Some(draft);
    }

    /// Reserve `n` media slots named by index. Existing slots are kept.
    pub fn reserve(&mut self, n: usize) {
        let have = self.media.len();
        self.media.extend((have..n).map(|i| EntryDraft {
            filename: segment_filename(i as u32),
            ..EntryDraft::default()
        }));
    }

    /// Fill reserved slot `index`.
    pub fn set_media(&mut self, index: usize, draft: EntryDraft) -> Result<(), StreamError> {
        let slots = self.media.len();
        let slot = self.media.get_mut(index).ok_or_else(|| {
            StreamError::Validation(format!("media slot {index} not reserved ({slots} slots)"))
        })?;
        *slot = draft;
        Ok(())
    }

    pub fn media_len(&self) -> usize {
        self.media.len()
    }

    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    /// Produce the manifest, or `ManifestCorrupt` naming every incomplete slot.
    pub fn finalize(self) -> Result<Manifest, StreamError> {
        let mut problems = Vec::new();

        let init = match self.init.map(EntryDraft::finish) {
            Some(Ok(e)) => Some(e),
            Some(Err(p)) => {
                problems.push(format!("init {p}"));
                None
            }
            None => None,
        };

        let mut chunks = Vec::with_capacity(self.media.len());
        for (i, draft) in self.media.into_iter().enumerate() {
            match draft.finish() {
                Ok(e) => chunks.push(e),
                Err(p) => problems.push(format!("slot {i}: {p}")),
            }
        }

        if !problems.is_empty() {
            return Err(StreamError::ManifestCorrupt(format!(
                "incomplete entries: {}",
                problems.join(", ")
            )));
        }

        Ok(Manifest { init, chunks, cipher: self.cipher })
    }
}

/// Draft for the init slot with the canonical filename.
pub fn init_draft(nonce: Nonce, tag: Tag) -> EntryDraft {
    EntryDraft::new(INIT_FILENAME, nonce, tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(b: u8) -> Nonce {
        Nonce::from_bytes([b; 12])
    }
    fn t(b: u8) -> Tag {
        Tag::from_bytes([b; 16])
    }

    #[test]
    fn media_keeps_insertion_order() {
        let mut b = ManifestBuilder::default();
        b.add_entry(SegmentRole::Media, EntryDraft::new("chunk002.enc", n(2), t(2)));
        b.add_entry(SegmentRole::Media, EntryDraft::new("chunk000.enc", n(0), t(0)));
        let m = b.finalize().unwrap();
        let names: Vec<_> = m.chunks.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["chunk002.enc", "chunk000.enc"]);
        assert!(m.init.is_none());
    }

    #[test]
    fn later_init_wins() {
        let mut b = ManifestBuilder::default();
        b.add_entry(SegmentRole::Init, init_draft(n(1), t(1)));
        b.add_entry(SegmentRole::Init, init_draft(n(9), t(9)));
        let m = b.finalize().unwrap();
        assert_eq!(m.init.unwrap().iv, n(9).to_hex());
    }

    #[test]
    fn reserved_slots_fill_out_of_order() {
        let mut b = ManifestBuilder::new(CipherSuite::ChaCha20Poly1305);
        b.reserve(3);
        for i in [2usize, 0, 1] {
            b.set_media(i, EntryDraft::new(segment_filename(i as u32), n(i as u8), t(i as u8)))
                .unwrap();
        }
        let m = b.finalize().unwrap();
        assert_eq!(m.cipher, CipherSuite::ChaCha20Poly1305);
        assert_eq!(m.chunks[1].filename, "chunk001.enc");
        assert_eq!(m.chunks[1].tag, t(1).to_hex());
    }

    #[test]
    fn finalize_names_every_unfilled_slot() {
        let mut b = ManifestBuilder::default();
        b.reserve(4);
        b.set_media(1, EntryDraft::new("chunk001.enc", n(1), t(1))).unwrap();
        b.set_media(2, EntryDraft { nonce: Some(n(2)), ..EntryDraft::default() }).unwrap();
        let err = b.finalize().unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, StreamError::ManifestCorrupt(_)));
        assert!(msg.contains("slot 0"), "{msg}");
        assert!(msg.contains("slot 2"), "{msg}");
        assert!(msg.contains("slot 3"), "{msg}");
        assert!(!msg.contains("slot 1"), "{msg}");
    }

    #[test]
    fn set_media_out_of_range_is_rejected() {
        let mut b = ManifestBuilder::default();
        b.reserve(1);
        assert!(b.set_media(5, EntryDraft::default()).is_err());
    }
}
