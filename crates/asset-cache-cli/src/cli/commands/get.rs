use anyhow::Context;

use super::{open_cache, parse_key};
use crate::cli::args::{GetArgs, GlobalArgs};
use crate::exit_codes;

pub async fn run(global: &GlobalArgs, args: GetArgs) -> anyhow::Result<i32> {
    let key = parse_key(&args.key.key)?;
    let cache = open_cache(global).await?;

    let code = match cache.get_cached_asset(&key).await {
        Some(asset) => {
            tokio::fs::write(&args.out, &asset.data)
                .await
                .with_context(|| format!("failed to write {}", args.out.display()))?;
            eprintln!(
                "wrote {} bytes ({}) to {}",
                asset.data.len(),
                asset.kind,
                args.out.display()
            );
            exit_codes::SUCCESS
        }
        None => {
            eprintln!("not cached: {}", cache.fingerprint(&key));
            exit_codes::NOT_FOUND
        }
    };

    cache.shutdown().await;
    Ok(code)
}
