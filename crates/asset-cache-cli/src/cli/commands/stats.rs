use asset_cache::CacheStats;

use super::open_cache;
use crate::cli::args::{GlobalArgs, StatsArgs};
use crate::exit_codes;

pub async fn run(global: &GlobalArgs, args: StatsArgs) -> anyhow::Result<i32> {
    let cache = open_cache(global).await?;
    let stats = cache.get_cache_stats().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render(&stats, &cache.config().cache_directory.display().to_string()));
    }

    cache.shutdown().await;
    Ok(exit_codes::SUCCESS)
}

fn render(stats: &CacheStats, dir: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("directory:      {dir}\n"));
    out.push_str(&format!(
        "disk:           {} entries, {} bytes\n",
        stats.disk_entries, stats.disk_usage_bytes
    ));
    out.push_str(&format!(
        "memory:         {} entries, {} bytes\n",
        stats.memory_entries, stats.memory_usage_bytes
    ));
    out.push_str(&format!("total assets:   {}\n", stats.total_cached_assets));
    if !stats.top_asset_types.is_empty() {
        let types: Vec<String> = stats
            .top_asset_types
            .iter()
            .map(|t| format!("{} ({})", t.asset_type, t.count))
            .collect();
        out.push_str(&format!("top types:      {}\n", types.join(", ")));
    }
    out
}
