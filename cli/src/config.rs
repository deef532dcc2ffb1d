use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use media_crypt::constants::{DEFAULT_CHUNK_SECS, DEFAULT_SEGMENT_SIZE};

#[derive(Parser)]
#[command(name = "media-crypt", about = "Segmented authenticated encryption for media assets")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the chunk plan (input manifest) for a media duration
    Plan {
        /// Media duration in seconds
        #[arg(long)]
        duration: f64,
        /// Target chunk length in seconds
        #[arg(long, default_value_t = DEFAULT_CHUNK_SECS)]
        chunk_len: f64,
        /// Extension of the raw chunk files
        #[arg(long, default_value = "mp4")]
        ext: String,
    },
    /// Check that every chunk listed in <source>/manifest.json exists
    Validate {
        #[arg(long)]
        source: PathBuf,
    },
    /// Encrypt a segmented source into an asset directory
    Encrypt(EncryptArgs),
    /// Decrypt a whole asset into one file
    Decrypt {
        #[arg(long)]
        asset: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
        /// Decrypt workers (1 = sequential)
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },
    /// Check store consistency and authenticate every segment
    Verify {
        #[arg(long)]
        asset: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
}

#[derive(Args)]
pub struct EncryptArgs {
    /// Directory holding the raw segments
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Asset directory to write
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, value_enum, default_value_t = SourceMode::Listed)]
    pub mode: SourceMode,
    /// Single input file (fixed mode)
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Segment size in bytes (fixed mode)
    #[arg(long, default_value_t = DEFAULT_SEGMENT_SIZE)]
    pub segment_size: usize,
    #[command(flatten)]
    pub key: KeyArgs,
    /// aes-256-gcm or chacha20-poly1305
    #[arg(long, default_value = "aes-256-gcm")]
    pub cipher: String,
    /// Encrypt workers (default: sized from the machine)
    #[arg(long)]
    pub workers: Option<usize>,
    /// Reuse segments journaled by an aborted run
    #[arg(long)]
    pub resume: bool,
    /// Do not write aes_key.bin into the asset directory
    #[arg(long)]
    pub no_key_file: bool,
    /// Print the run telemetry as JSON on stdout
    #[arg(long)]
    pub telemetry_json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceMode {
    /// <source>/manifest.json lists the raw chunks
    Listed,
    /// Fragmented MP4 directory (*init.mp4 + *.m4s)
    Fragmented,
    /// Byte split of --input into --segment-size pieces
    Fixed,
}

#[derive(Args, Default)]
#[group(multiple = false)]
pub struct KeyArgs {
    /// Raw 32-byte key file
    #[arg(long)]
    pub key_file: Option<PathBuf>,
    /// Key as 64 hex chars
    #[arg(long)]
    pub key_hex: Option<String>,
    /// Key as standard base64
    #[arg(long)]
    pub key_base64: Option<String>,
}
