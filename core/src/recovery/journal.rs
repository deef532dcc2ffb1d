//! Run journal.
//!
//! One JSON object per line followed by `|` and the first 8 hex chars of the
//! BLAKE3 hash of that JSON text. The first line binds the journal to a key
//! fingerprint and cipher; every later line records one committed segment.
//! Lines are appended only after the segment file was renamed into place.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::JOURNAL_FILENAME;
use crate::crypto::{CipherSuite, Key, Nonce, Tag};
use crate::segment::SegmentRole;
use crate::store::SegmentStore;
use crate::types::StreamError;

const CHECKSUM_LEN: usize = 8;

/// A segment committed by an earlier (possibly aborted) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub index: u32,
    pub role: SegmentRole,
    pub filename: String,
    pub iv: String,
    pub tag: String,
    /// Ciphertext length on disk.
    pub len: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub at: String,
}

impl JournalRecord {
    pub fn new(role: SegmentRole, index: u32, filename: &str, nonce: &Nonce, tag: &Tag, len: u64) -> Self {
        Self {
            index,
            role,
            filename: filename.to_string(),
            iv: nonce.to_hex(),
            tag: tag.to_hex(),
            len,
            start: None,
            duration: None,
            at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_timing(mut self, start: Option<f64>, duration: Option<f64>) -> Self {
        self.start = start;
        self.duration = duration;
        self
    }

    pub fn nonce(&self) -> Result<Nonce, StreamError> {
        Nonce::from_hex(&self.iv).map_err(|e| StreamError::Validation(format!("journal iv: {e}")))
    }

    pub fn tag(&self) -> Result<Tag, StreamError> {
        Tag::from_hex(&self.tag).map_err(|e| StreamError::Validation(format!("journal tag: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum JournalLine {
    Header { key: String, cipher: CipherSuite, at: String },
    Segment(JournalRecord),
}

fn format_line(line: &JournalLine) -> Result<String, StreamError> {
    let json = serde_json::to_string(line)?;
    let hash = blake3::hash(json.as_bytes()).to_hex();
    Ok(format!("{json}|{}\n", &hash[..CHECKSUM_LEN]))
}

/// `None` for a torn, edited or otherwise unreadable line.
fn parse_line(raw: &str) -> Option<JournalLine> {
    let (json, checksum) = raw.rsplit_once('|')?;
    let hash = blake3::hash(json.as_bytes()).to_hex();
    if &hash[..CHECKSUM_LEN] != checksum {
        return None;
    }
    serde_json::from_str(json).ok()
}

/// Everything a journal on disk says.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    /// Key fingerprint and cipher from the header, if the header survived.
    pub binding: Option<(String, CipherSuite)>,
    pub records: Vec<JournalRecord>,
    pub skipped_lines: usize,
}

/// Read a journal. Bad lines are skipped with a warning.
pub fn replay(path: &Path) -> Result<Replay, StreamError> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Replay::default();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(JournalLine::Header { key, cipher, .. }) if n == 0 => out.binding = Some((key, cipher)),
            Some(JournalLine::Segment(rec)) => out.records.push(rec),
            _ => {
                warn!(line = n + 1, "skipping corrupt journal line");
                out.skipped_lines += 1;
            }
        }
    }
    Ok(out)
}

pub struct RunJournal {
    path: PathBuf,
    file: File,
}

impl RunJournal {
    /// Start a fresh journal in `dir`, replacing any previous one.
    pub fn create(dir: &Path, key: &Key, cipher: CipherSuite) -> Result<Self, StreamError> {
        let path = dir.join(JOURNAL_FILENAME);
        let mut file = File::create(&path)?;
        let header = JournalLine::Header {
            key: key.fingerprint(),
            cipher,
            at: chrono::Utc::now().to_rfc3339(),
        };
        file.write_all(format_line(&header)?.as_bytes())?;
        file.sync_data()?;
        Ok(Self { path, file })
    }

    /// Reopen the journal in `dir` for appending and return what it recorded.
    ///
    /// Without a journal (or with an unreadable header) this starts fresh.
    /// A journal written under another key or cipher is refused.
    pub fn resume(dir: &Path, key: &Key, cipher: CipherSuite) -> Result<(Self, Vec<JournalRecord>), StreamError> {
        let path = dir.join(JOURNAL_FILENAME);
        if !path.is_file() {
            debug!("no journal to resume from");
            return Ok((Self::create(dir, key, cipher)?, Vec::new()));
        }

        let replayed = replay(&path)?;
        let Some((fingerprint, journal_cipher)) = replayed.binding else {
            warn!("journal header unreadable; starting over");
            return Ok((Self::create(dir, key, cipher)?, Vec::new()));
        };
        if fingerprint != key.fingerprint() {
            return Err(StreamError::Validation(
                "journal was written with a different key; refusing to resume".into(),
            ));
        }
        if journal_cipher != cipher {
            return Err(StreamError::Validation(format!(
                "journal was written with {journal_cipher}, not {cipher}"
            )));
        }

        info!(records = replayed.records.len(), skipped = replayed.skipped_lines, "journal replayed");
        if replayed.skipped_lines == 0 {
            let file = OpenOptions::new().append(true).open(&path)?;
            return Ok((Self { path, file }, replayed.records));
        }

        // Rewrite without the bad lines so a torn tail never swallows the next append.
        let mut journal = Self::create(dir, key, cipher)?;
        for rec in &replayed.records {
            journal.append(rec)?;
        }
        Ok((journal, replayed.records))
    }

    pub fn append(&mut self, record: &JournalRecord) -> Result<(), StreamError> {
        let line = format_line(&JournalLine::Segment(record.clone()))?;
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the journal once the manifest is on disk.
    pub fn finish(self) -> Result<(), StreamError> {
        drop(self.file);
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

/// Keyed by (role, index).
pub type ResumeSet = HashMap<(SegmentRole, u32), JournalRecord>;

/// Records whose file is still present with the journaled length. Later
/// records for the same slot win.
pub fn usable_records(records: Vec<JournalRecord>, store: &SegmentStore) -> ResumeSet {
    let mut out = ResumeSet::new();
    for rec in records {
        match store.file_len(&rec.filename) {
            Some(len) if len == rec.len && rec.nonce().is_ok() && rec.tag().is_ok() => {
                out.insert((rec.role, rec.index), rec);
            }
            found => {
                debug!(segment = %rec.filename, expected = rec.len, ?found, "journal record not reusable");
                out.remove(&(rec.role, rec.index));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn rec(i: u32, len: u64) -> JournalRecord {
        JournalRecord::new(
            SegmentRole::Media,
            i,
            &crate::manifest::segment_filename(i),
            &Nonce::from_bytes([i as u8; 12]),
            &Tag::from_bytes([i as u8; 16]),
            len,
        )
    }

    #[test]
    fn lines_carry_blake3_checksum() {
        let line = format_line(&JournalLine::Segment(rec(1, 10))).unwrap();
        let (json, sum) = line.trim_end().rsplit_once('|').unwrap();
        assert_eq!(sum.len(), 8);
        assert_eq!(&blake3::hash(json.as_bytes()).to_hex()[..8], sum);
        assert!(parse_line(line.trim_end()).is_some());

        let tampered = line.trim_end().replace("\"len\":10", "\"len\":11");
        assert!(parse_line(&tampered).is_none());
    }

    #[test]
    fn resume_returns_appended_records_and_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let key = Key::from_bytes([5; 32]);
        let mut j = RunJournal::create(dir.path(), &key, CipherSuite::Aes256Gcm).unwrap();
        j.append(&rec(0, 100)).unwrap();
        j.append(&rec(1, 100)).unwrap();
        drop(j);

        let path = dir.path().join(JOURNAL_FILENAME);
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"kind\":\"segment\",\"index\":2|deadbeef\n").unwrap();

        let (mut j, records) = RunJournal::resume(dir.path(), &key, CipherSuite::Aes256Gcm).unwrap();
        assert_eq!(records.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1]);

        // The bad line is gone once the journal is reopened.
        j.append(&rec(2, 100)).unwrap();
        drop(j);
        let replayed = replay(&path).unwrap();
        assert_eq!(replayed.skipped_lines, 0);
        assert_eq!(replayed.records.len(), 3);
    }

    #[test]
    fn resume_refuses_other_key() {
        let dir = tempfile::tempdir().unwrap();
        RunJournal::create(dir.path(), &Key::from_bytes([1; 32]), CipherSuite::Aes256Gcm).unwrap();
        let err = RunJournal::resume(dir.path(), &Key::from_bytes([2; 32]), CipherSuite::Aes256Gcm)
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::Validation(_)));
    }

    #[test]
    fn journal_never_contains_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let key = Key::from_bytes([0xab; 32]);
        let j = RunJournal::create(dir.path(), &key, CipherSuite::Aes256Gcm).unwrap();
        let mut text = String::new();
        File::open(j.path()).unwrap().read_to_string(&mut text).unwrap();
        assert!(!text.contains(&"ab".repeat(32)));
        assert!(!text.contains(&key.to_base64()));
        j.finish().unwrap();
        assert!(!dir.path().join(JOURNAL_FILENAME).exists());
    }

    #[test]
    fn usable_records_require_matching_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::create(dir.path()).unwrap();
        store.write_segment("chunk000.enc", &[0u8; 100]).unwrap();
        store.write_segment("chunk001.enc", &[0u8; 99]).unwrap();
        let set = usable_records(vec![rec(0, 100), rec(1, 100), rec(2, 100)], &store);
        assert_eq!(set.len(), 1);
        assert!(set.contains_key(&(SegmentRole::Media, 0)));
    }
}
