//! Offline embedding provider based on hashed character trigrams.

use crate::embeddings::{l2_normalize, EmbeddingProvider};
use ragdex_core::AppResult;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Deterministic feature-hashing embedder.
///
/// Every word longer than two bytes contributes its character trigrams and
/// the whole word to hashed buckets. Texts that share word fragments end up
/// with a positive inner product, which is enough to exercise the retrieval
/// pipeline without a model server. Works on any script, including Hangul.
#[derive(Debug)]
pub struct HashingProvider {
    dimensions: usize,
    normalize: bool,
}

impl HashingProvider {
    /// Create a new hashing provider with specified dimensions.
    pub fn new(dimensions: usize, normalize: bool) -> Self {
        Self {
            dimensions,
            normalize,
        }
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes
            .iter()
            .fold(0u64, |acc, &b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split_whitespace()
            .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(trigram.as_bytes(), 37)] += (*freq as f32).sqrt();
            }

            embedding[self.bucket(word.as_bytes(), 31)] += *freq as f32;
        }

        if self.normalize {
            l2_normalize(&mut embedding);
        }
        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        "hashing-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_embed_is_normalized() {
        let provider = HashingProvider::new(384, true);
        let embedding = provider.embed("hello world").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_embed_batch_shapes() {
        let provider = HashingProvider::new(128, true);
        let texts = vec![
            "hello world".to_string(),
            "다자녀가정 지원".to_string(),
            "rust programming".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 128);
            assert!((norm(embedding) - 1.0).abs() < 0.001);
        }
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = HashingProvider::new(384, true);
        let first = provider.embed("deterministic test").await.unwrap();
        let second = provider.embed("deterministic test").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_shared_fragments_score_higher() {
        let provider = HashingProvider::new(384, true);
        let query = provider.embed("다자녀가정 혜택").await.unwrap();
        let related = provider
            .embed("다자녀가정은 셋째 자녀부터 지원합니다")
            .await
            .unwrap();
        let unrelated = provider.embed("임산부 의료비 지원").await.unwrap();

        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashingProvider::new(384, true);
        let embedding = provider.embed("").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_unnormalized_output() {
        let provider = HashingProvider::new(64, false);
        let embedding = provider.embed("repeat repeat repeat").await.unwrap();
        assert!(norm(&embedding) > 1.0);
    }
}
