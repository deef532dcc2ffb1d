//! Asset directory persistence.
//!
//! Every file is written under `<name>.tmp` and renamed into place, so a
//! crash never leaves a half-written file under a name a manifest refers to.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::constants::{KEY_FILENAME, MANIFEST_FILENAME, TMP_SUFFIX};
use crate::crypto::Key;
use crate::manifest::{is_init_filename, parse_segment_filename, Manifest};
use crate::types::StreamError;
use crate::utils::base_name;

#[derive(Debug, Clone)]
pub struct SegmentStore {
    dir: PathBuf,
}

impl SegmentStore {
    /// Create (if needed) and open an asset directory for writing.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open an existing asset directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(StreamError::SourceUnavailable(format!(
                "asset directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a manifest filename resolves to. Directory prefixes are dropped.
    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.dir.join(base_name(filename))
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.path_of(filename).is_file()
    }

    /// Length of a committed file, `None` if absent.
    pub fn file_len(&self, filename: &str) -> Option<u64> {
        fs::metadata(self.path_of(filename)).ok().filter(|m| m.is_file()).map(|m| m.len())
    }

    pub fn write_segment(&self, filename: &str, ciphertext: &[u8]) -> Result<(), StreamError> {
        self.commit(base_name(filename), |w| w.write_all(ciphertext))?;
        debug!(segment = %filename, len = ciphertext.len(), "segment committed");
        Ok(())
    }

    pub fn read_segment(&self, filename: &str) -> Result<Bytes, StreamError> {
        match fs::read(self.path_of(filename)) {
            Ok(b) => Ok(Bytes::from(b)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StreamError::MissingSegment {
                missing: vec![base_name(filename).to_string()],
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_manifest(&self) -> bool {
        self.exists(MANIFEST_FILENAME)
    }

    /// Write the manifest. Callers do this only after every segment is committed.
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<(), StreamError> {
        self.commit(MANIFEST_FILENAME, |w| {
            serde_json::to_writer_pretty(&mut *w, manifest).map_err(io::Error::from)?;
            w.write_all(b"\n")
        })
    }

    pub fn read_manifest(&self) -> Result<Manifest, StreamError> {
        let path = self.path_of(MANIFEST_FILENAME);
        let raw = fs::read(&path).map_err(|e| {
            StreamError::SourceUnavailable(format!("{}: {e}", path.display()))
        })?;
        Manifest::from_json_slice(&raw)
    }

    /// Drop a manifest left by an earlier run; it would not match new ciphertext.
    pub fn remove_manifest(&self) -> Result<bool, StreamError> {
        match fs::remove_file(self.path_of(MANIFEST_FILENAME)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete segment files an earlier, longer run left behind: media files
    /// with index `>= media_count`, and the init file when `keep_init` is false.
    pub fn prune_segments(&self, media_count: usize, keep_init: bool) -> Result<Vec<String>, StreamError> {
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let stale = match parse_segment_filename(&name) {
                Some(i) => i as usize >= media_count,
                None => !keep_init && is_init_filename(&name),
            };
            if stale {
                fs::remove_file(entry.path())?;
                removed.push(name);
            }
        }
        if !removed.is_empty() {
            removed.sort();
            warn!(files = %removed.join(", "), "removed stale segment files");
        }
        Ok(removed)
    }

    /// Write the raw key next to the ciphertext. Mode 0600 on unix.
    pub fn write_key(&self, key: &Key) -> Result<(), StreamError> {
        self.commit(KEY_FILENAME, |w| w.write_all(key.as_bytes()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(self.path_of(KEY_FILENAME), fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Remove leftovers of interrupted writes.
    pub fn sweep_tmp(&self) -> Result<usize, StreamError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().ends_with(TMP_SUFFIX) {
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(path = %entry.path().display(), error = %e, "could not remove stale tmp file");
                } else {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn commit(
        &self,
        name: &str,
        write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    ) -> Result<(), StreamError> {
        let final_path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}{TMP_SUFFIX}"));

        let mut w = BufWriter::new(File::create(&tmp_path)?);
        write(&mut w)?;
        let file = w.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}
