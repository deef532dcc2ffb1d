//! Shared protocol constants.

/// Symmetric key length for every supported AEAD (bytes).
pub const KEY_LEN_32: usize = 32;

/// Standard 12-byte nonce length for AES-GCM and ChaCha20-Poly1305.
pub const NONCE_LEN_12: usize = 12;

/// Fixed AEAD tag length (bytes).
pub const TAG_LEN: usize = 16;

/// Name of the manifest document inside an asset directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Raw key file written next to the ciphertext when key persistence is on.
pub const KEY_FILENAME: &str = "aes_key.bin";

/// Ciphertext file holding the init segment.
pub const INIT_FILENAME: &str = "chunk_init.enc";

/// Prefix and extension of media segment ciphertext files (`chunk007.enc`).
pub const SEGMENT_PREFIX: &str = "chunk";
pub const SEGMENT_EXT: &str = "enc";

/// Resume journal kept in the asset directory while a run is in flight.
pub const JOURNAL_FILENAME: &str = ".journal";

/// Suffix used for not-yet-committed segment writes.
pub const TMP_SUFFIX: &str = ".tmp";

/// Default target chunk length when planning segment boundaries (seconds).
pub const DEFAULT_CHUNK_SECS: f64 = 10.0;

/// Default byte size for direct (non-container) splits.
pub const DEFAULT_SEGMENT_SIZE: usize = 1024 * 1024; // 1 MiB
/// Upper sanity bound for a single segment held in memory (256 MiB).
pub const MAX_SEGMENT_SIZE: usize = 256 * 1024 * 1024;

/// Bounded-channel depth per worker in the encrypt pipeline.
pub const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Cipher suite identifiers.
pub mod cipher_ids {
    pub const AES256_GCM: u16        = 0x0001;
    pub const CHACHA20_POLY1305: u16 = 0x0002;
}
