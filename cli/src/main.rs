mod config;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use media_crypt::crypto::{read_key_file, CipherSuite, Credentials, FileKeyProvider, Key, KeyProvider};
use media_crypt::manifest::validate_report;
use media_crypt::pipeline::{decrypt_asset, encrypt_asset, verify_asset, ParallelismProfile, PipelineConfig};
use media_crypt::segment::{plan_input_manifest, FixedSizeSource, FragmentedDirSource, ListedSource, SegmentSource};
use media_crypt::types::StreamError;

use config::{Cli, Command, EncryptArgs, KeyArgs, SourceMode};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Plan { duration, chunk_len, ext } => {
            let plan = plan_input_manifest(duration, chunk_len, &ext)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Command::Validate { source } => {
            let listed = ListedSource::open(&source)?;
            match validate_report(listed.manifest(), listed.dir()) {
                Ok(()) => println!("{} chunks present", listed.manifest().chunks.len()),
                Err(StreamError::MissingSegment { missing }) => {
                    for name in &missing {
                        eprintln!("missing: {name}");
                    }
                    bail!("{} of {} segments missing", missing.len(), listed.manifest().chunks.len());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Encrypt(args) => encrypt(args)?,

        Command::Decrypt { asset, out, key, workers } => {
            let key = asset_key(&key, &asset)?;
            let profile = ParallelismProfile::fixed(workers);
            let (plaintext, telemetry) = decrypt_asset(&asset, &key, &profile)
                .with_context(|| format!("decrypting {}", asset.display()))?;
            fs::write(&out, &plaintext).with_context(|| format!("writing {}", out.display()))?;
            info!(bytes = plaintext.len(), segments = telemetry.segments_total(), "asset decrypted");
        }

        Command::Verify { asset, key } => {
            let key = asset_key(&key, &asset)?;
            let telemetry = verify_asset(&asset, &key).with_context(|| format!("verifying {}", asset.display()))?;
            println!("{} segments authenticated", telemetry.segments_total());
        }
    }

    Ok(())
}

fn encrypt(args: EncryptArgs) -> anyhow::Result<()> {
    let cipher: CipherSuite = args.cipher.parse()?;
    let source = open_source(&args)?;

    let explicit = explicit_key(&args.key)?;
    let generated = explicit.is_none() && !args.resume;
    let key = match explicit {
        Some(key) => key,
        None if args.resume => read_key_file(&args.out.join(media_crypt::constants::KEY_FILENAME))
            .context("--resume without an explicit key needs the key file of the aborted run")?,
        None => Key::generate()?,
    };

    let profile = match args.workers {
        Some(n) => ParallelismProfile::fixed(n),
        None => ParallelismProfile::dynamic(args.segment_size as u64, 0.5, 64),
    };
    let config = PipelineConfig::new(cipher, profile)
        .with_persist_key(!args.no_key_file)
        .with_resume(args.resume);

    let outcome = encrypt_asset(source.as_ref(), &args.out, &key, &config)
        .with_context(|| format!("encrypting into {}", args.out.display()))?;

    if args.telemetry_json {
        println!("{}", serde_json::to_string_pretty(&outcome.telemetry)?);
    } else {
        println!(
            "{} chunks{} written to {}",
            outcome.manifest.chunks.len(),
            if outcome.manifest.init.is_some() { " + init" } else { "" },
            args.out.display()
        );
    }
    if args.no_key_file && generated {
        // The generated key exists nowhere else.
        println!("key (base64): {}", key.to_base64());
    }
    Ok(())
}

fn open_source(args: &EncryptArgs) -> anyhow::Result<Box<dyn SegmentSource>> {
    let source_dir = || args.source.as_deref().context("--source is required for this mode");
    let source: Box<dyn SegmentSource> = match args.mode {
        SourceMode::Listed => Box::new(ListedSource::open(source_dir()?)?),
        SourceMode::Fragmented => Box::new(FragmentedDirSource::new(source_dir()?)),
        SourceMode::Fixed => {
            let input = args.input.as_deref().context("--input is required in fixed mode")?;
            Box::new(FixedSizeSource::new(input, args.segment_size)?)
        }
    };
    Ok(source)
}

fn explicit_key(args: &KeyArgs) -> anyhow::Result<Option<Key>> {
    Ok(if let Some(path) = &args.key_file {
        Some(read_key_file(path).with_context(|| format!("reading key file {}", path.display()))?)
    } else if let Some(hex) = &args.key_hex {
        Some(Key::from_hex(hex)?)
    } else if let Some(b64) = &args.key_base64 {
        Some(Key::from_base64(b64)?)
    } else {
        None
    })
}

/// Explicit key, else the asset's own key file.
fn asset_key(args: &KeyArgs, asset: &Path) -> anyhow::Result<Key> {
    match explicit_key(args)? {
        Some(key) => Ok(key),
        None => FileKeyProvider::new(asset)
            .fetch_key("", &Credentials::anonymous())
            .with_context(|| format!("no key given and no key file in {}", asset.display())),
    }
}
