//! Staged writes for downloads
//!
//! A download streams into `<dest>.part` and is renamed over `dest` only once
//! every byte has arrived, so a failed transfer never clobbers a good file.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::BackendResult;

/// Sibling of `dest` that receives the bytes while a download is running
pub fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    dest.with_file_name(name)
}

/// Run `write` against a fresh staging file, then move it over `dest`.
///
/// On failure the staging file is removed and `dest` is left as it was.
pub async fn write_staged<F, Fut>(dest: &Path, write: F) -> BackendResult<u64>
where
    F: FnOnce(tokio::fs::File) -> Fut,
    Fut: Future<Output = BackendResult<u64>>,
{
    let staging = staging_path(dest);
    let file = tokio::fs::File::create(&staging).await?;

    let written = match write(file).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                tracing::debug!(path = %staging.display(), error = %cleanup, "Staging file not removed");
            }
            return Err(e);
        }
    };

    tokio::fs::rename(&staging, dest).await?;
    Ok(written)
}
