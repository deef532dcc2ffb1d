use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::crypto::CipherSuite;
use crate::pipeline::parallelism::ParallelismProfile;

/// Reported after each segment is committed (file renamed, journaled).
#[derive(Debug, Clone)]
pub struct CommitEvent {
    /// Segments committed so far in this run, resumed ones included.
    pub committed: usize,
    pub total: usize,
    pub filename: String,
    pub resumed: bool,
}

pub type CommitHook = Arc<dyn Fn(&CommitEvent) + Send + Sync>;

#[derive(Clone)]
pub struct PipelineConfig {
    pub cipher: CipherSuite,
    pub profile: ParallelismProfile,
    /// Write `aes_key.bin` into the asset directory.
    pub persist_key: bool,
    /// Reuse segments recorded in the run journal of an aborted run.
    pub resume: bool,
    /// Checked between segments; raising it makes the run return `Cancelled`.
    pub cancel: Arc<AtomicBool>,
    pub on_commit: Option<CommitHook>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cipher: CipherSuite::default(),
            profile: ParallelismProfile::single_threaded(),
            persist_key: true,
            resume: false,
            cancel: Arc::new(AtomicBool::new(false)),
            on_commit: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("cipher", &self.cipher)
            .field("profile", &self.profile)
            .field("persist_key", &self.persist_key)
            .field("resume", &self.resume)
            .field("cancelled", &self.is_cancelled())
            .field("on_commit", &self.on_commit.is_some())
            .finish()
    }
}

impl PipelineConfig {
    pub fn new(cipher: CipherSuite, profile: ParallelismProfile) -> Self {
        Self { cipher, profile, ..Self::default() }
    }

    pub fn with_cipher(mut self, cipher: CipherSuite) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_profile(mut self, profile: ParallelismProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_workers(self, workers: usize) -> Self {
        self.with_profile(ParallelismProfile::fixed(workers))
    }

    pub fn with_persist_key(mut self, persist_key: bool) -> Self {
        self.persist_key = persist_key;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_commit_hook(mut self, hook: impl Fn(&CommitEvent) + Send + Sync + 'static) -> Self {
        self.on_commit = Some(Arc::new(hook));
        self
    }

    /// Handle another thread can raise to stop the run.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub(crate) fn notify(&self, event: &CommitEvent) {
        if let Some(hook) = &self.on_commit {
            hook(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_persist_key_single_threaded() {
        let c = PipelineConfig::default();
        assert!(c.persist_key);
        assert!(!c.resume);
        assert_eq!(c.cipher, CipherSuite::Aes256Gcm);
        assert_eq!(c.profile, ParallelismProfile::single_threaded());
        assert!(!c.is_cancelled());
    }

    #[test]
    fn cancel_handle_is_shared() {
        let c = PipelineConfig::default().with_workers(4).with_persist_key(false);
        c.cancel_handle().store(true, Ordering::Relaxed);
        assert!(c.is_cancelled());
        assert_eq!(c.profile.worker_count, 4);
        assert!(format!("{c:?}").contains("cancelled: true"));
    }
}
