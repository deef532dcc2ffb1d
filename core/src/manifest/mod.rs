//! Manifest protocol: schema, index naming, builder and validators.

pub mod naming;
pub mod types;
pub mod builder;
pub mod validate;

pub use naming::{chunk_filename, is_init_filename, parse_segment_filename, segment_filename};
pub use types::{InputEntry, InputManifest, Manifest, ManifestEntry};
pub use builder::{init_draft, EntryDraft, ManifestBuilder};
pub use validate::{validate, validate_report, verify_store};
