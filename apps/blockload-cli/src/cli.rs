//! Command-line arguments.

use std::path::PathBuf;

use anyhow::{Context, bail};
use blockload_protocol::ByteRange;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "blockload")]
#[command(about = "Upload large files as block blobs")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: ~/.config/blockload/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Clone, Default)]
pub struct TargetArgs {
    /// Pre-signed object URL (overrides [target] url)
    #[arg(long)]
    pub url: Option<String>,

    /// Base64 AES-256 key (overrides encryption_key)
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a file and commit it as one object
    Upload {
        /// File to upload
        file: PathBuf,

        /// Block size in bytes
        #[arg(long)]
        block_size: Option<u64>,

        /// Blocks uploaded at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Content type of the committed object
        #[arg(long)]
        content_type: Option<String>,

        /// Encrypt every block with the configured key
        #[arg(long, default_value_t = false)]
        encrypt: bool,

        /// Skip the per-block Content-MD5 header
        #[arg(long, default_value_t = false)]
        no_md5: bool,

        /// Write the upload result JSON here instead of stdout
        #[arg(long)]
        result: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show the properties of a committed object
    Stat {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Download an object, or part of it
    Get {
        /// Inclusive byte range, e.g. 0-1023
        #[arg(long, value_parser = parse_range)]
        range: Option<ByteRange>,

        /// Upload result JSON; its artifacts drive per-block decryption
        #[arg(long, conflicts_with = "range")]
        artifacts: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Generate a new encryption key
    Keygen {
        /// Store the key in the config file
        #[arg(long, default_value_t = false)]
        save: bool,
    },
}

/// Parses an inclusive `first-last` byte range.
pub fn parse_range(value: &str) -> anyhow::Result<ByteRange> {
    let (first, last) = value
        .split_once('-')
        .context("expected a range like 0-1023")?;
    let first: u64 = first.trim().parse().context("invalid range start")?;
    let last: u64 = last.trim().parse().context("invalid range end")?;
    if last < first {
        bail!("range end {last} is before start {first}");
    }
    let end = last.checked_add(1).context("range end too large")?;
    Ok(ByteRange::new(first, end)?)
}
