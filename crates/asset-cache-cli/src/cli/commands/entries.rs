use super::open_cache;
use crate::cli::args::{GlobalArgs, ListArgs};
use crate::exit_codes;

pub async fn run(global: &GlobalArgs, args: ListArgs) -> anyhow::Result<i32> {
    let cache = open_cache(global).await?;
    let entries = cache.disk_entries().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("no entries on disk");
    } else {
        for e in &entries {
            let expires = e
                .expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "{}  {:<8} {:<6} q={:>5.1} p={:>5.1} {:>10}B  expires {}  {}",
                e.fingerprint,
                e.asset_type,
                e.kind.to_string(),
                e.quality_score,
                e.priority,
                e.size_bytes,
                expires,
                e.prompt
            );
        }
    }

    cache.shutdown().await;
    Ok(exit_codes::SUCCESS)
}
