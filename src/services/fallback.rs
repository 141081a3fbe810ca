use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::{models::announcement::AnnouncementRecord, services::store::AnnouncementStore};

/// File name of the static fallback, served next to the API.
pub const FALLBACK_FILE_NAME: &str = "announcement.json";

pub fn fallback_path(static_dir: &Path) -> PathBuf {
    static_dir.join(FALLBACK_FILE_NAME)
}

/// Writes `record` to `path` through a sibling temp file so readers never
/// see a half-written document.
pub async fn write_fallback(path: &Path, record: &AnnouncementRecord) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Seeds the fallback file with the store's current record if it does
/// not exist yet.
pub async fn ensure_fallback(path: &Path, store: &AnnouncementStore) -> anyhow::Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    write_fallback(path, &store.get()).await
}

/// Keeps the fallback file in step with the store.
///
/// Updates are written one at a time in publish order. Never blocks a
/// request handler and never propagates errors (logs a warning on failure).
pub fn spawn_mirror(store: Arc<AnnouncementStore>, path: PathBuf) -> tokio::task::JoinHandle<()> {
    let mut updates = store.subscribe();

    tokio::spawn(async move {
        loop {
            let record = match updates.recv().await {
                Ok(record) => record,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("fallback mirror skipped {skipped} updates");
                    store.get()
                }
                Err(RecvError::Closed) => break,
            };

            if let Err(e) = write_fallback(&path, &record).await {
                tracing::warn!("fallback mirror write to {} failed: {e}", path.display());
            }
        }
    })
}
