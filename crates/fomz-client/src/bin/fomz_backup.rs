//! # fomz-backup
//!
//! Writes a JSON backup of every locally published form, with responses
//! and analytics, to disk.
//!
//! ```text
//! fomz-backup [OUTPUT_PATH]
//! ```
//!
//! Without an output path the file lands in `<data dir>/backups/` and only
//! the 10 most recent backups there are kept.

use std::path::{Path, PathBuf};

use anyhow::Context;
use fomz_client::{init_tracing, ClientConfig};
use fomz_shared::SystemClock;
use fomz_store::{LocalStore, SqliteMedium};
use tracing::info;

const KEEP_BACKUPS: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    info!(data_dir = %config.data_dir.display(), "Loaded configuration");

    let medium = SqliteMedium::open_in_dir(&config.data_dir, Some(config.local_capacity_bytes()))
        .context("Failed to open local store")?;
    let mut store = LocalStore::with_config(
        medium,
        config.local.clone(),
        std::sync::Arc::new(SystemClock),
    );

    let backup = store.export_all().context("Export failed")?;
    let json = serde_json::to_string_pretty(&backup).context("Serialization failed")?;

    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let file_path = match &explicit {
        Some(path) => path.clone(),
        None => {
            let backup_dir = config.data_dir.join("backups");
            tokio::fs::create_dir_all(&backup_dir)
                .await
                .context("Failed to create backup dir")?;
            let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
            backup_dir.join(format!("fomz_backup_{timestamp}.json"))
        }
    };

    tokio::fs::write(&file_path, json.as_bytes())
        .await
        .with_context(|| format!("Failed to write backup to {}", file_path.display()))?;

    if explicit.is_none() {
        if let Some(dir) = file_path.parent() {
            cleanup_old_backups(dir, KEEP_BACKUPS).await;
        }
    }

    info!(path = %file_path.display(), forms = backup.forms.len(), "Backup completed");
    println!("{}", file_path.display());
    Ok(())
}

/// Delete all but the `keep` most recently modified backups in `dir`.
async fn cleanup_old_backups(dir: &Path, keep: usize) {
    let Ok(mut rd) = tokio::fs::read_dir(dir).await else {
        return;
    };

    let mut files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    while let Ok(Some(entry)) = rd.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Ok(meta) = entry.metadata().await {
            if let Ok(modified) = meta.modified() {
                files.push((path, modified));
            }
        }
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in files.iter().skip(keep) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove old backup");
        }
    }
}
