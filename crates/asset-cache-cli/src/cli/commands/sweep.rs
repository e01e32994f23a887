use super::open_cache;
use crate::cli::args::GlobalArgs;
use crate::exit_codes;

pub async fn run(global: &GlobalArgs) -> anyhow::Result<i32> {
    let cache = open_cache(global).await?;
    let removed = cache.sweep_disk().await;
    let stats = cache.get_cache_stats().await;
    println!(
        "removed {removed} entries; {} remain ({} bytes)",
        stats.disk_entries, stats.disk_usage_bytes
    );
    cache.shutdown().await;
    Ok(exit_codes::SUCCESS)
}
