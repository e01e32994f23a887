use anyhow::Context;
use asset_cache::{Asset, StoreOutcome};
use bytes::Bytes;

use super::{open_cache, parse_key};
use crate::cli::args::{GlobalArgs, PutArgs};
use crate::exit_codes;

pub async fn run(global: &GlobalArgs, args: PutArgs) -> anyhow::Result<i32> {
    let key = parse_key(&args.key.key)?;
    if !(0.0..=100.0).contains(&args.quality) {
        anyhow::bail!("--quality must be within 0-100, got {}", args.quality);
    }

    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let cache = open_cache(global).await?;
    let asset = Asset::new(Bytes::from(data), args.kind);

    let code = match cache
        .cache_asset(&key, asset, args.quality, args.generation_ms)
        .await
    {
        StoreOutcome::Cached(fp) => {
            if cache.is_on_disk(&key).await {
                println!("{fp}");
                exit_codes::SUCCESS
            } else {
                eprintln!(
                    "{fp} not persisted: quality {} is below the threshold {} or the disk tier is full",
                    args.quality,
                    cache.config().priority_threshold
                );
                exit_codes::ERROR
            }
        }
        StoreOutcome::Rejected { reason } => {
            eprintln!("rejected: {reason}");
            exit_codes::ERROR
        }
    };

    cache.shutdown().await;
    Ok(code)
}
