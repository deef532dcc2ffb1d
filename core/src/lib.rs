//! media-crypt
//!
//! Segmented authenticated encryption for just-in-time media playback.
//! Each segment is sealed on its own under a fresh nonce, and a manifest
//! binds every ciphertext file to the nonce and tag needed to open it.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;

pub mod crypto;
pub mod telemetry;

// Data model and protocol
pub mod segment;
pub mod manifest;
pub mod store;
pub mod recovery;

// Processing layers
pub mod worker;
pub mod pipeline;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::crypto::{CipherSuite, Credentials, FileKeyProvider, Key, KeyProvider, Nonce, StaticKeyProvider, Tag};
    pub use crate::manifest::{InputManifest, Manifest, ManifestBuilder, ManifestEntry};
    pub use crate::pipeline::{
        decrypt_asset, encrypt_asset, verify_asset, AssetReader, EncryptOutcome, ParallelismProfile, PipelineConfig,
    };
    pub use crate::segment::{
        FixedSizeSource, FragmentedDirSource, ListedSource, MemorySource, Segment, SegmentRole, SegmentSource,
    };
    pub use crate::store::SegmentStore;
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::{StreamError, StreamResult};
    pub use crate::worker::{decrypt_entry, decrypt_segment, encrypt_segment};
}
