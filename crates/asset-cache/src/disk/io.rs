//! Filesystem helpers for the disk tier.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{CacheError, CacheResult};
use crate::fingerprint::Fingerprint;

/// Extension of committed entry files.
pub(crate) const ENTRY_EXTENSION: &str = "cache";

/// Extension of in-flight writes; never indexed.
pub(crate) const TEMP_EXTENSION: &str = "tmp";

pub(crate) fn entry_path(dir: &Path, fingerprint: &Fingerprint) -> PathBuf {
    dir.join(format!("{}.{}", fingerprint, ENTRY_EXTENSION))
}

/// Fingerprint named by an entry file, if the path follows the convention.
pub(crate) fn fingerprint_from_path(path: &Path) -> Option<Fingerprint> {
    if path.extension()? != ENTRY_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    Some(Fingerprint::from_hex(stem))
}

/// Write via a temp file and rename, so readers never see a partial file.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> CacheResult<()> {
    let temp_path = path.with_extension(TEMP_EXTENSION);

    if let Err(e) = fs::write(&temp_path, content).await {
        return Err(CacheError::Io {
            message: format!("failed to write temp file {}: {}", temp_path.display(), e),
        });
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(CacheError::Io {
            message: format!("failed to rename temp file {}: {}", temp_path.display(), e),
        });
    }

    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub(crate) async fn remove_if_exists(path: &Path) -> CacheResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::Io {
            message: format!("failed to remove {}: {}", path.display(), e),
        }),
    }
}
