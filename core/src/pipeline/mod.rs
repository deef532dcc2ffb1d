//! Pipeline wiring: parallelism, configuration, the encrypt run and the asset reader.

pub mod parallelism;
pub mod config;
pub mod encrypt;
pub mod reader;
pub mod core;

pub use parallelism::ParallelismProfile;
pub use config::{CommitEvent, CommitHook, PipelineConfig};
pub use encrypt::{run_encrypt_pipeline, EncryptOutcome};
pub use reader::AssetReader;
pub use self::core::{decrypt_asset, encrypt_asset, verify_asset};
