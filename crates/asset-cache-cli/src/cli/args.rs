use asset_cache::PayloadKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "asset-cache",
    version,
    about = "Inspect and maintain an asset-cache directory"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// YAML config file (defaults to ASSET_CACHE_* environment variables)
    #[arg(long, global = true, env = "ASSET_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory, overrides the config
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show tier usage and entry counts
    Stats(StatsArgs),
    /// List entries stored on disk
    List(ListArgs),
    /// Print the fingerprint of a key
    Fingerprint(KeyArgs),
    /// Write a cached payload to a file
    Get(GetArgs),
    /// Store a file as a cached asset
    Put(PutArgs),
    /// Remove expired and unreadable disk entries
    Sweep,
    /// Delete every cached entry (requires --yes)
    Clear(ClearArgs),
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Cache key as JSON, e.g. '{"prompt":"cat","assetType":"sprite"}'
    #[arg(long)]
    pub key: String,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Output file for the payload
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Payload file
    #[arg(long)]
    pub file: PathBuf,

    /// Quality score (0-100)
    #[arg(long)]
    pub quality: f64,

    /// Payload kind: image, sound or binary
    #[arg(long, default_value = "binary")]
    pub kind: PayloadKind,

    /// Time the generator spent producing the asset
    #[arg(long, default_value_t = 0)]
    pub generation_ms: u64,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Confirm deletion
    #[arg(long)]
    pub yes: bool,
}
