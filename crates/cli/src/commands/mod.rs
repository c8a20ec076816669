//! Command handlers for the ragdex CLI.

pub mod index;
pub mod inspect;
pub mod query;
pub mod watch;

pub use index::{ClearCommand, IngestCommand, RebuildCommand, RemoveCommand};
pub use inspect::{DocumentsCommand, StatsCommand};
pub use query::QueryCommand;
pub use watch::WatchCommand;

use ragdex_core::{config::AppConfig, AppError, AppResult};
use ragdex_knowledge::config::{get_config_path, load_config, save_config};
use ragdex_knowledge::{IndexConfig, IndexManager, IngestHandle, IngestQueue};
use std::sync::Arc;

/// Index configuration plus a manager with the persisted snapshot loaded.
pub struct Session {
    pub config: IndexConfig,
    pub manager: Arc<IndexManager>,
}

impl Session {
    /// Open the workspace index.
    ///
    /// Writes a default `index.yaml` on first use. A corrupt snapshot, or one
    /// built with a different embedding dimension, is reported and the
    /// session continues unloaded so it can be rebuilt.
    pub async fn open(app: &AppConfig) -> AppResult<Self> {
        if !get_config_path(&app.workspace).exists() {
            save_config(&app.workspace, &IndexConfig::default())?;
        }

        let config = load_config(&app.workspace)?;
        let manager = Arc::new(IndexManager::from_config(config.clone())?);

        match manager.load().await {
            Ok(true) => tracing::debug!("Index loaded"),
            Ok(false) => tracing::debug!("No index on disk yet"),
            Err(e @ (AppError::SnapshotCorrupt(_) | AppError::DimensionMismatch { .. })) => {
                tracing::warn!("{}; run `ragdex rebuild` to recreate the index", e);
            }
            Err(e) => return Err(e),
        }

        Ok(Self { config, manager })
    }

    /// Start the ingest queue for this session's data directory.
    pub fn queue(&self) -> IngestHandle {
        IngestQueue::spawn(self.manager.clone(), self.config.data_dir.clone())
    }
}

/// Print `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdex_knowledge::EmbeddingConfig;
    use tempfile::TempDir;

    fn app_config(workspace: &std::path::Path) -> AppConfig {
        AppConfig {
            workspace: workspace.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_writes_default_config() {
        let temp = TempDir::new().unwrap();
        let session = Session::open(&app_config(temp.path())).await.unwrap();

        assert!(get_config_path(temp.path()).exists());
        assert_eq!(session.config.data_dir, temp.path().join("data"));
        assert!(!session.manager.is_loaded());
    }

    #[tokio::test]
    async fn test_open_survives_corrupt_snapshot() {
        let temp = TempDir::new().unwrap();
        let app = app_config(temp.path());

        let session = Session::open(&app).await.unwrap();
        std::fs::create_dir_all(&session.config.index_dir).unwrap();
        std::fs::write(session.config.meta_path(), "{not json").unwrap();
        std::fs::write(session.config.vectors_path(), b"RDXV").unwrap();

        let reopened = Session::open(&app).await.unwrap();
        assert!(!reopened.manager.is_loaded());
    }

    #[tokio::test]
    async fn test_open_after_dimension_change_allows_rebuild() {
        let temp = TempDir::new().unwrap();
        let app = app_config(temp.path());

        let session = Session::open(&app).await.unwrap();
        std::fs::create_dir_all(&session.config.data_dir).unwrap();
        let doc = session.config.data_dir.join("a.txt");
        std::fs::write(&doc, "다자녀가정은 셋째 자녀부터 지원합니다").unwrap();
        assert_eq!(session.queue().request_ingest(vec![doc]).await.unwrap(), 1);
        assert_eq!(session.manager.stats().dimension, Some(384));

        let changed = IndexConfig {
            embedding: EmbeddingConfig {
                dimensions: 128,
                ..Default::default()
            },
            ..Default::default()
        };
        save_config(temp.path(), &changed).unwrap();

        let reopened = Session::open(&app).await.unwrap();
        assert!(!reopened.manager.is_loaded());

        assert_eq!(reopened.queue().request_rebuild().await.unwrap(), 1);
        let stats = reopened.manager.stats();
        assert!(stats.loaded);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.dimension, Some(128));
    }
}
