//! Index configuration management.

use crate::embeddings::EmbeddingConfig;
use ragdex_core::config::STATE_DIR;
use ragdex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the persisted vector blob.
pub const VECTORS_FILE: &str = "vectors.bin";

/// File name of the persisted metadata + text document.
pub const META_FILE: &str = "meta.json";

/// Settings for the document index and retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Directory holding the source documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding the persisted snapshot
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Default number of chunks to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum inner-product score for a hit
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Quiet period before watched files are ingested
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("index")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    10
}

fn default_similarity_threshold() -> f32 {
    0.1
}

fn default_debounce_ms() -> u64 {
    3000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            index_dir: default_index_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            debounce_ms: default_debounce_ms(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Check the invariants the chunker and embedder rely on.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        self.embedding.validate()
    }

    /// Resolve relative directories against the workspace root.
    pub fn resolved(mut self, workspace: &Path) -> Self {
        if self.data_dir.is_relative() {
            self.data_dir = workspace.join(&self.data_dir);
        }
        if self.index_dir.is_relative() {
            self.index_dir = workspace.join(&self.index_dir);
        }
        self
    }

    /// Path of the vector blob.
    pub fn vectors_path(&self) -> PathBuf {
        self.index_dir.join(VECTORS_FILE)
    }

    /// Path of the metadata document.
    pub fn meta_path(&self) -> PathBuf {
        self.index_dir.join(META_FILE)
    }
}

/// Load index configuration.
///
/// Loads from `.ragdex/index.yaml` if it exists, otherwise returns defaults.
/// Relative directories are resolved against `workspace` and the result is
/// validated.
pub fn load_config(workspace: &Path) -> AppResult<IndexConfig> {
    let config_path = get_config_path(workspace);

    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: IndexConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        tracing::debug!("Loaded index config from {:?}", config_path);
        config
    } else {
        tracing::debug!("Using default index config (no config file found)");
        IndexConfig::default()
    };

    let config = config.resolved(workspace);
    config.validate()?;
    Ok(config)
}

/// Save index configuration.
pub fn save_config(workspace: &Path, config: &IndexConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved index config to {:?}", config_path);
    Ok(())
}

/// Get the path to the index config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("index.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).unwrap();

        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 10);
        assert!((config.similarity_threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.data_dir, temp.path().join("data"));
        assert_eq!(config.meta_path(), temp.path().join("index").join("meta.json"));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let config = IndexConfig {
            chunk_size: 500,
            chunk_overlap: 50,
            data_dir: PathBuf::from("/srv/docs"),
            ..Default::default()
        };

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path()).unwrap();
        assert_eq!(loaded.chunk_size, 500);
        assert_eq!(loaded.chunk_overlap, 50);
        assert_eq!(loaded.data_dir, PathBuf::from("/srv/docs"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let config = IndexConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_file_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "chunk_size: 10\nchunk_overlap: 20\n").unwrap();

        assert!(load_config(temp.path()).is_err());
    }
}
