use super::open_cache;
use crate::cli::args::{ClearArgs, GlobalArgs};
use crate::exit_codes;

pub async fn run(global: &GlobalArgs, args: ClearArgs) -> anyhow::Result<i32> {
    if !args.yes {
        anyhow::bail!("Refusing to clear without --yes (safety).");
    }
    let cache = open_cache(global).await?;
    let before = cache.get_cache_stats().await.disk_entries;
    cache.clear_cache().await;
    println!(
        "cleared {before} entries from {}",
        cache.config().cache_directory.display()
    );
    cache.shutdown().await;
    Ok(exit_codes::SUCCESS)
}
