//! Embedding configuration types.

use ragdex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding configuration for an index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "hashing", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Maximum batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Provider-specific configuration (JSON object)
    #[serde(default)]
    pub provider_config: serde_json::Value,
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "hashing-v1".to_string(),
            dimensions: 384,
            normalize: true,
            batch_size: default_batch_size(),
            provider_config: serde_json::json!({}),
        }
    }
}

impl EmbeddingConfig {
    /// Reject settings no provider can honor.
    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a string setting from `provider_config`.
    pub fn provider_setting(&self, key: &str) -> Option<&str> {
        self.provider_config.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "hashing");
        assert_eq!(config.model, "hashing-v1");
        assert_eq!(config.dimensions, 384);
        assert!(config.normalize);
        assert_eq!(config.batch_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = EmbeddingConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_yaml_defaults_applied() {
        let yaml = "provider: ollama\nmodel: nomic-embed-text\ndimensions: 768\n";
        let config: EmbeddingConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.normalize);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.provider_setting("base_url"), None);
    }

    #[test]
    fn test_provider_setting() {
        let config = EmbeddingConfig {
            provider_config: serde_json::json!({"base_url": "http://gpu-box:11434"}),
            ..Default::default()
        };
        assert_eq!(
            config.provider_setting("base_url"),
            Some("http://gpu-box:11434")
        );
    }
}
