use serde::{Deserialize, Serialize};

use crate::constants::INIT_FILENAME;
use crate::crypto::{CipherSuite, Nonce, Tag};
use crate::manifest::naming::{is_init_filename, parse_segment_filename, segment_filename};
use crate::types::StreamError;
use crate::utils::base_name;

/// One ciphertext segment and the material needed to open it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    /// Hex of the 12-byte nonce. Written lowercase, read in either case.
    pub iv: String,
    /// Hex of the 16-byte tag. Written lowercase, read in either case.
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl ManifestEntry {
    pub fn new(filename: impl Into<String>, nonce: &Nonce, tag: &Tag) -> Self {
        Self {
            filename: filename.into(),
            iv: nonce.to_hex(),
            tag: tag.to_hex(),
            start: None,
            duration: None,
        }
    }

    pub fn nonce(&self) -> Result<Nonce, StreamError> {
        Nonce::from_hex(&self.iv)
            .map_err(|e| StreamError::ManifestCorrupt(format!("{}: iv: {e}", self.filename)))
    }

    pub fn tag(&self) -> Result<Tag, StreamError> {
        Tag::from_hex(&self.tag)
            .map_err(|e| StreamError::ManifestCorrupt(format!("{}: tag: {e}", self.filename)))
    }

    fn check(&self) -> Result<(), String> {
        if self.filename.is_empty() {
            return Err("empty filename".into());
        }
        if self.filename.contains("..") || self.filename.starts_with('/') || self.filename.contains('\\') {
            return Err(format!("{}: filename escapes the asset directory", self.filename));
        }
        Nonce::from_hex(&self.iv).map_err(|e| format!("{}: iv: {e}", self.filename))?;
        Tag::from_hex(&self.tag).map_err(|e| format!("{}: tag: {e}", self.filename))?;
        Ok(())
    }
}

/// Manifest document: optional init entry plus chunks in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, with = "empty_object_slot")]
    pub init: Option<ManifestEntry>,
    pub chunks: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "CipherSuite::is_default")]
    pub cipher: CipherSuite,
}

impl Manifest {
    /// Parse and structurally check a manifest. Every bad entry is reported.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, StreamError> {
        let manifest: Manifest =
            serde_json::from_slice(raw).map_err(|e| StreamError::ManifestCorrupt(e.to_string()))?;
        manifest.check()?;
        Ok(manifest)
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>, StreamError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Structural checks: filenames are local, every iv/tag decodes to the
    /// right length, and `chunks[i]` names `chunkNNN.enc` for exactly `i`
    /// (so entries can be neither reordered nor repeated).
    pub fn check(&self) -> Result<(), StreamError> {
        let mut problems: Vec<String> = self
            .init
            .iter()
            .chain(self.chunks.iter())
            .filter_map(|e| e.check().err())
            .collect();

        if let Some(init) = &self.init {
            if !is_init_filename(base_name(&init.filename)) {
                problems.push(format!("init entry is {}, expected {INIT_FILENAME}", init.filename));
            }
        }
        for (i, entry) in self.chunks.iter().enumerate() {
            if parse_segment_filename(base_name(&entry.filename)) != Some(i as u32) {
                problems.push(format!(
                    "chunk {i} is {}, expected {}",
                    entry.filename,
                    segment_filename(i as u32)
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(StreamError::ManifestCorrupt(problems.join("; ")))
        }
    }

    /// Init entry first (if any), then chunks in order.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.init.iter().chain(self.chunks.iter())
    }
}

/// Entry of an input manifest written by the external splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEntry {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl InputEntry {
    pub fn named(filename: impl Into<String>) -> Self {
        Self { filename: filename.into(), start: None, duration: None }
    }
}

/// Pre-encryption listing of raw segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputManifest {
    #[serde(default, with = "empty_object_slot")]
    pub init: Option<InputEntry>,
    #[serde(default)]
    pub chunks: Vec<InputEntry>,
}

/// `Option<T>` that serialises `None` as `{}` and reads `{}` / `null` back as `None`.
mod empty_object_slot {
    use serde::de::{DeserializeOwned, Error as _};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<T, S>(value: &Option<T>, s: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(s),
            None => s.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<Option<T>, D::Error>
    where
        T: DeserializeOwned,
        D: Deserializer<'de>,
    {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Object(m) if m.is_empty() => Ok(None),
            other => serde_json::from_value(other).map(Some).map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "init": {},
        "chunks": [
            {"filename": "chunk000.enc", "iv": "585e7e11eb50e0f2e7b2605d", "tag": "2d7cc2fda347157342f24d84838f61cb", "start": 0, "duration": 10}
        ]
    }"#;

    #[test]
    fn empty_init_object_reads_as_none() {
        let m = Manifest::from_json_slice(SAMPLE.as_bytes()).unwrap();
        assert!(m.init.is_none());
        assert_eq!(m.chunks.len(), 1);
        assert_eq!(m.chunks[0].start, Some(0.0));
        assert_eq!(m.cipher, CipherSuite::Aes256Gcm);
    }

    #[test]
    fn none_init_writes_empty_object_and_default_cipher_is_omitted() {
        let m = Manifest::from_json_slice(SAMPLE.as_bytes()).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&m.to_json_pretty().unwrap()).unwrap();
        assert_eq!(v["init"], serde_json::json!({}));
        assert!(v.get("cipher").is_none());
    }

    #[test]
    fn non_default_cipher_is_written() {
        let mut m = Manifest::from_json_slice(SAMPLE.as_bytes()).unwrap();
        m.cipher = CipherSuite::ChaCha20Poly1305;
        let v: serde_json::Value = serde_json::from_slice(&m.to_json_pretty().unwrap()).unwrap();
        assert_eq!(v["cipher"], "chacha20-poly1305");
    }

    #[test]
    fn missing_fields_are_manifest_corrupt() {
        let raw = r#"{"init": {}, "chunks": [{"filename": "chunk000.enc", "iv": "00"}]}"#;
        assert!(matches!(Manifest::from_json_slice(raw.as_bytes()), Err(StreamError::ManifestCorrupt(_))));
        assert!(matches!(Manifest::from_json_slice(b"[]"), Err(StreamError::ManifestCorrupt(_))));
    }

    #[test]
    fn every_bad_entry_is_reported() {
        let raw = r#"{"chunks": [
            {"filename": "chunk000.enc", "iv": "00", "tag": "2d7cc2fda347157342f24d84838f61cb"},
            {"filename": "../etc/passwd", "iv": "585e7e11eb50e0f2e7b2605d", "tag": "2d7cc2fda347157342f24d84838f61cb"}
        ]}"#;
        let err = Manifest::from_json_slice(raw.as_bytes()).unwrap_err().to_string();
        assert!(err.contains("chunk000.enc: iv"));
        assert!(err.contains("escapes"));
    }

    fn canonical(n: u32) -> Manifest {
        let chunks = (0..n)
            .map(|i| ManifestEntry::new(segment_filename(i), &Nonce::from_bytes([i as u8; 12]), &Tag::from_bytes([7; 16])))
            .collect();
        Manifest { init: None, chunks, cipher: CipherSuite::default() }
    }

    #[test]
    fn chunk_position_must_match_its_filename() {
        canonical(3).check().unwrap();

        let mut swapped = canonical(3);
        swapped.chunks.swap(0, 2);
        let msg = swapped.check().unwrap_err().to_string();
        assert!(msg.contains("chunk 0 is chunk002.enc"), "{msg}");
        assert!(msg.contains("chunk 2 is chunk000.enc"), "{msg}");

        let mut repeated = canonical(3);
        repeated.chunks[1] = repeated.chunks[0].clone();
        assert!(matches!(repeated.check(), Err(StreamError::ManifestCorrupt(_))));

        let raw = serde_json::to_vec(&swapped).unwrap();
        assert!(matches!(Manifest::from_json_slice(&raw), Err(StreamError::ManifestCorrupt(_))));
    }

    #[test]
    fn init_entry_must_use_init_filename() {
        let mut m = canonical(1);
        m.init = Some(ManifestEntry::new("chunk000.enc", &Nonce::from_bytes([9; 12]), &Tag::from_bytes([9; 16])));
        let msg = m.check().unwrap_err().to_string();
        assert!(msg.contains("expected chunk_init.enc"), "{msg}");

        m.init = Some(ManifestEntry::new(INIT_FILENAME, &Nonce::from_bytes([9; 12]), &Tag::from_bytes([9; 16])));
        m.check().unwrap();
    }

    #[test]
    fn uppercase_hex_is_read() {
        let raw = SAMPLE.replace("585e7e11eb50e0f2e7b2605d", "585E7E11EB50E0F2E7B2605D");
        let m = Manifest::from_json_slice(raw.as_bytes()).unwrap();
        assert_eq!(m.chunks[0].nonce().unwrap().to_hex(), "585e7e11eb50e0f2e7b2605d");
    }

    #[test]
    fn input_manifest_accepts_splitter_output() {
        let raw = r#"{"chunks": [{"filename": "chunks/chunk000.mp4", "start": 0, "duration": 10.0}]}"#;
        let m: InputManifest = serde_json::from_str(raw).unwrap();
        assert!(m.init.is_none());
        assert_eq!(m.chunks[0].duration, Some(10.0));
    }
}
