//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata for one indexed chunk.
///
/// Position `i` in the metadata array matches position `i` in the vector
/// index and in the text array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Globally unique, never reused
    pub uid: u64,

    /// Filename of the owning document
    pub source: String,

    /// 0-based position within the source
    #[serde(alias = "chunk_id")]
    pub chunk_index: u32,

    /// Absolute path of the source at ingestion time
    pub path: PathBuf,
}

/// A retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Chunk text
    pub text: String,

    /// Source filename
    pub source: String,

    /// Position of the chunk within its source
    pub chunk_index: u32,

    /// Inner-product similarity
    pub score: f32,
}

/// One document as seen through the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub source: String,
    pub path: PathBuf,
    pub chunks: u32,
    /// First 200 characters of chunk 0
    pub preview: String,
}

/// Statistics for the installed index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Whether an index is installed
    pub loaded: bool,

    /// Number of distinct sources
    pub documents: u32,

    /// Number of chunks
    pub chunks: u32,

    /// Embedding dimension, when loaded
    pub dimension: Option<usize>,

    /// Next uid that ingestion will assign
    pub next_uid: u64,
}
