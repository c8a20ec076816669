//! Document index and retrieval.
//!
//! Documents are extracted, chunked, embedded and stored in an exact
//! inner-product index that is persisted as a snapshot pair. One
//! [`IndexManager`] owns the index; writes go through an [`IngestQueue`]
//! (fed by the CLI or a [`DocumentWatcher`]) and reads go through a
//! [`QueryEngine`].

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod manager;
pub mod query;
pub mod queue;
pub mod snapshot;
pub mod types;
pub mod vector_index;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use config::IndexConfig;
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use extract::{Extractor, FileExtractor};
pub use manager::{IndexManager, IndexState};
pub use query::{QueryEngine, QueryExpander};
pub use queue::{IngestHandle, IngestQueue};
pub use types::{ChunkMeta, DocumentSummary, IndexStats, SearchHit};
pub use vector_index::FlatIndex;
pub use watcher::{DocumentWatcher, WatchPhase, WatcherStatus};
