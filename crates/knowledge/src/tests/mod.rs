//! Cross-component scenarios.


use crate::config::IndexConfig;
use crate::manager::IndexManager;
use crate::query::QueryEngine;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A workspace with a data directory and a manager using the hashing
/// embedder.
pub(crate) struct Fixture {
    pub dir: TempDir,
    pub manager: Arc<IndexManager>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let config = config.resolved(dir.path());
        fs::create_dir_all(&config.data_dir).unwrap();
        let manager = Arc::new(IndexManager::from_config(config).unwrap());
        Self { dir, manager }
    }

    pub fn data_dir(&self) -> &Path {
        &self.manager.config().data_dir
    }

    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.data_dir().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    pub fn engine(&self) -> QueryEngine {
        QueryEngine::new(
            self.manager.clone(),
            self.manager.embedder(),
            self.manager.config().similarity_threshold,
        )
    }

    /// Reopen the same workspace with a fresh manager.
    pub fn reopen(&self) -> Arc<IndexManager> {
        Arc::new(IndexManager::from_config(self.manager.config().clone()).unwrap())
    }
}

/// The two-document welfare corpus.
pub(crate) const DOC_A: &str = "다자녀가정은 셋째 자녀부터 지원합니다";
pub(crate) const DOC_B: &str = "임산부 의료비 지원";
