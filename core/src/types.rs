use std::io;

use thiserror::Error;

use crate::crypto::CryptoError;

/// Unified pipeline error.
/// - `From<T>` impls enable `?` across the pipeline.
/// - Validation variants carry every offender, not just the first.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The segment source could not produce segments (missing input, bad plan).
    #[error("segment source unavailable: {0}")]
    SourceUnavailable(String),

    /// A manifest references segments absent from storage.
    #[error("missing segments: {}", .missing.join(", "))]
    MissingSegment { missing: Vec<String> },

    /// Random source unavailable, bad key, or AEAD seal failure. Fatal.
    #[error("encryption failure: {0}")]
    EncryptionFailure(CryptoError),

    /// Tag verification failed; the segment's plaintext was discarded.
    #[error("authentication failure: segment {segment} unavailable")]
    AuthenticationFailure { segment: String },

    /// Malformed or incomplete manifest, or manifest/store mismatch.
    #[error("manifest corrupt: {0}")]
    ManifestCorrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic high-level validation with a descriptive message.
    #[error("validation error: {0}")]
    Validation(String),

    /// The run was cancelled between segments.
    #[error("pipeline cancelled")]
    Cancelled,

    #[error("pipeline error: {0}")]
    Pipeline(&'static str),
}

impl From<CryptoError> for StreamError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::TagMismatch => StreamError::AuthenticationFailure { segment: "<unknown>".into() },
            other => StreamError::EncryptionFailure(other),
        }
    }
}

impl StreamError {
    /// Attach the segment name to an authentication failure.
    pub fn for_segment(self, name: &str) -> Self {
        match self {
            StreamError::AuthenticationFailure { .. } => {
                StreamError::AuthenticationFailure { segment: name.to_string() }
            }
            other => other,
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, StreamError::AuthenticationFailure { .. })
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mismatch_maps_to_authentication_failure() {
        let e: StreamError = CryptoError::TagMismatch.into();
        assert!(e.is_authentication_failure());
        let e = e.for_segment("chunk002.enc");
        assert_eq!(e.to_string(), "authentication failure: segment chunk002.enc unavailable");
    }

    #[test]
    fn other_crypto_errors_are_encryption_failures() {
        let e: StreamError = CryptoError::RandomUnavailable("gone".into()).into();
        assert!(matches!(e, StreamError::EncryptionFailure(_)));
    }

    #[test]
    fn missing_segments_are_all_listed() {
        let e = StreamError::MissingSegment {
            missing: vec!["chunk000.mp4".into(), "chunk004.mp4".into()],
        };
        assert_eq!(e.to_string(), "missing segments: chunk000.mp4, chunk004.mp4");
    }
}
