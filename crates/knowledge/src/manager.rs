//! Authoritative owner of the document index.
//!
//! The installed [`IndexState`] is immutable and shared through an `Arc`.
//! Every write builds a complete replacement off to the side, persists it,
//! and only then swaps it in, so readers see either the old or the new state
//! and never a partially updated one. Writes are serialized by a single
//! ingestion lock; a caller that races an in-flight write gets
//! [`AppError::IngestionInProgress`] instead of waiting.

use crate::chunker::chunk_text;
use crate::config::IndexConfig;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::extract::{Extractor, FileExtractor};
use crate::snapshot;
use crate::types::{ChunkMeta, DocumentSummary, IndexStats};
use crate::vector_index::FlatIndex;
use futures::future::join_all;
use parking_lot::RwLock;
use ragdex_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Characters of chunk 0 shown in a document listing.
const PREVIEW_CHARS: usize = 200;

/// Vectors plus the metadata and text stored at the same positions.
#[derive(Debug, Clone)]
pub struct IndexState {
    index: FlatIndex,
    metas: Vec<ChunkMeta>,
    texts: Vec<String>,
}

impl IndexState {
    /// Empty state for vectors of `dimension` values.
    pub fn empty(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            metas: Vec::new(),
            texts: Vec::new(),
        }
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn metas(&self) -> &[ChunkMeta] {
        &self.metas
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Distinct source filenames.
    pub fn sources(&self) -> HashSet<&str> {
        self.metas.iter().map(|m| m.source.as_str()).collect()
    }
}

/// A file that produced chunks and is waiting to be embedded.
struct PendingDocument {
    source: String,
    path: PathBuf,
    chunks: Vec<String>,
}

#[derive(Debug)]
pub struct IndexManager {
    config: IndexConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn Extractor>,
    state: RwLock<Option<Arc<IndexState>>>,
    /// Uid high-water mark; only advanced under the ingestion lock
    next_uid: AtomicU64,
    ingest_lock: Mutex<()>,
}

impl IndexManager {
    /// Create an unloaded manager. Call [`load`](Self::load) to pick up a
    /// persisted snapshot.
    pub fn new(
        config: IndexConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            config,
            embedder,
            extractor,
            state: RwLock::new(None),
            next_uid: AtomicU64::new(0),
            ingest_lock: Mutex::new(()),
        }
    }

    /// Create a manager with the configured embedding provider and the
    /// default file extractor.
    pub fn from_config(config: IndexConfig) -> AppResult<Self> {
        config.validate()?;
        let embedder = create_provider(&config.embedding)?;
        Ok(Self::new(config, embedder, Arc::new(FileExtractor)))
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        self.embedder.clone()
    }

    /// The installed state, if any. Cheap; never blocks on writers.
    pub fn snapshot(&self) -> Option<Arc<IndexState>> {
        self.state.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().is_some()
    }

    /// Next uid ingestion will assign.
    pub fn next_uid(&self) -> u64 {
        self.next_uid.load(Ordering::SeqCst)
    }

    fn install(&self, state: Option<Arc<IndexState>>) {
        *self.state.write() = state;
    }

    fn begin_write(&self) -> AppResult<MutexGuard<'_, ()>> {
        self.ingest_lock
            .try_lock()
            .map_err(|_| AppError::IngestionInProgress)
    }

    /// Run a write once the ingestion lock is free. The ingest queue worker
    /// uses this so queued requests wait out a direct caller.
    pub(crate) async fn ingest_queued(&self, paths: &[PathBuf]) -> AppResult<u32> {
        let _guard = self.ingest_lock.lock().await;
        self.ingest_locked(paths).await
    }

    pub(crate) async fn remove_queued(&self, source: &str) -> AppResult<bool> {
        let _guard = self.ingest_lock.lock().await;
        self.remove_locked(source).await
    }

    pub(crate) async fn rebuild_queued(&self, dir: &Path) -> AppResult<u32> {
        let _guard = self.ingest_lock.lock().await;
        self.rebuild_locked(dir).await
    }

    /// Load the persisted snapshot.
    ///
    /// Returns `Ok(false)` when nothing has been persisted yet. On any error
    /// the manager is left unloaded.
    #[instrument(skip(self))]
    pub async fn load(&self) -> AppResult<bool> {
        let _guard = self.begin_write()?;

        match self.load_locked().await {
            Ok(loaded) => Ok(loaded),
            Err(e) => {
                self.install(None);
                warn!("Failed to load index snapshot: {}", e);
                Err(e)
            }
        }
    }

    async fn load_locked(&self) -> AppResult<bool> {
        let index_dir = self.config.index_dir.clone();
        let loaded = tokio::task::spawn_blocking(move || snapshot::load(&index_dir))
            .await
            .map_err(|e| AppError::Other(format!("snapshot load task failed: {}", e)))??;

        let Some(snapshot) = loaded else {
            self.install(None);
            return Ok(false);
        };

        let expected = self.embedder.dimensions();
        if snapshot.index.dimension() != expected {
            return Err(AppError::DimensionMismatch {
                expected,
                actual: snapshot.index.dimension(),
            });
        }

        let next_uid = snapshot.next_uid.max(self.next_uid());
        self.next_uid.store(next_uid, Ordering::SeqCst);
        self.install(Some(Arc::new(IndexState {
            index: snapshot.index,
            metas: snapshot.metas,
            texts: snapshot.texts,
        })));

        Ok(true)
    }

    /// Extract and chunk one file on a blocking thread.
    async fn prepare(&self, path: &Path) -> AppResult<Vec<String>> {
        let extractor = self.extractor.clone();
        let path = path.to_path_buf();
        let (size, overlap) = (self.config.chunk_size, self.config.chunk_overlap);

        tokio::task::spawn_blocking(move || {
            let text = extractor.extract(&path)?;
            chunk_text(&text, size, overlap)
        })
        .await
        .map_err(|e| AppError::Other(format!("extraction task failed: {}", e)))?
    }

    /// Prepare candidates concurrently. Files that fail or yield no text are
    /// logged and dropped; the rest keep their input order.
    async fn prepare_all(&self, candidates: Vec<(String, PathBuf)>) -> Vec<PendingDocument> {
        let results = join_all(candidates.iter().map(|(_, path)| self.prepare(path))).await;

        candidates
            .into_iter()
            .zip(results)
            .filter_map(|((source, path), result)| match result {
                Ok(chunks) if chunks.is_empty() => {
                    warn!(source = %source, "No text extracted; skipping");
                    None
                }
                Ok(chunks) => {
                    debug!(source = %source, chunks = chunks.len(), "Prepared document");
                    Some(PendingDocument {
                        source,
                        path: path.canonicalize().unwrap_or(path),
                        chunks,
                    })
                }
                Err(e) => {
                    warn!(source = %source, "Skipping document: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Embed every chunk of `documents` with one provider call.
    async fn embed_documents(&self, documents: &[PendingDocument]) -> AppResult<Vec<Vec<f32>>> {
        let texts: Vec<String> = documents
            .iter()
            .flat_map(|d| d.chunks.iter().cloned())
            .collect();
        self.embed_texts(&texts).await
    }

    async fn embed_texts(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    /// Append `documents` to `base`, assigning uids from `first_uid`.
    fn extend_state(
        base: &mut IndexState,
        documents: Vec<PendingDocument>,
        vectors: &[Vec<f32>],
        first_uid: u64,
    ) -> AppResult<u64> {
        base.index.add(vectors)?;

        let mut uid = first_uid;
        for document in documents {
            for (chunk_index, text) in document.chunks.into_iter().enumerate() {
                base.metas.push(ChunkMeta {
                    uid,
                    source: document.source.clone(),
                    chunk_index: chunk_index as u32,
                    path: document.path.clone(),
                });
                base.texts.push(text);
                uid += 1;
            }
        }
        Ok(uid)
    }

    /// Persist `state` and install it.
    async fn commit(&self, state: IndexState, next_uid: u64) -> AppResult<()> {
        let state = Arc::new(state);
        let to_save = state.clone();
        let index_dir = self.config.index_dir.clone();

        tokio::task::spawn_blocking(move || {
            snapshot::save(
                &index_dir,
                &to_save.index,
                &to_save.metas,
                &to_save.texts,
                next_uid,
            )
        })
        .await
        .map_err(|e| AppError::Other(format!("snapshot save task failed: {}", e)))??;

        self.next_uid.store(next_uid, Ordering::SeqCst);
        self.install(Some(state));
        Ok(())
    }

    /// Ingest files into the index.
    ///
    /// Files whose name is already indexed, files with unsupported
    /// extensions and files that fail extraction are skipped. Returns the
    /// number of chunks added; when that is zero nothing is modified.
    #[instrument(skip(self, paths), fields(files = paths.len()))]
    pub async fn ingest(&self, paths: &[PathBuf]) -> AppResult<u32> {
        let _guard = self.begin_write()?;
        self.ingest_locked(paths).await
    }

    async fn ingest_locked(&self, paths: &[PathBuf]) -> AppResult<u32> {
        let start = Instant::now();
        let current = self.snapshot();
        let mut seen: HashSet<String> = current
            .as_ref()
            .map(|s| s.sources().into_iter().map(str::to_string).collect())
            .unwrap_or_default();

        let mut candidates = Vec::new();
        for path in paths {
            let Some(source) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                debug!("Skipping path without a file name: {}", path.display());
                continue;
            };

            if !self.extractor.supports(path) {
                debug!(source = %source, "Skipping unsupported file type");
                continue;
            }

            if !seen.insert(source.clone()) {
                info!(source = %source, "Skipping already indexed document");
                continue;
            }

            candidates.push((source, path.clone()));
        }

        let documents = self.prepare_all(candidates).await;

        let added: usize = documents.iter().map(|d| d.chunks.len()).sum();
        if added == 0 {
            info!("No new documents to index");
            return Ok(0);
        }

        let vectors = self.embed_documents(&documents).await?;

        let mut next = match &current {
            Some(state) => state.as_ref().clone(),
            None => IndexState::empty(self.embedder.dimensions()),
        };
        let document_count = documents.len();
        let next_uid = Self::extend_state(&mut next, documents, &vectors, self.next_uid())?;
        self.commit(next, next_uid).await?;

        info!(
            documents = document_count,
            chunks = added,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ingestion completed"
        );

        Ok(added as u32)
    }

    /// Remove every chunk of `source` and rebuild the vector index from the
    /// survivors. Returns `false`, touching nothing, when `source` is not
    /// indexed.
    #[instrument(skip(self))]
    pub async fn remove(&self, source: &str) -> AppResult<bool> {
        let _guard = self.begin_write()?;
        self.remove_locked(source).await
    }

    async fn remove_locked(&self, source: &str) -> AppResult<bool> {
        let Some(current) = self.snapshot() else {
            return Ok(false);
        };

        let mut metas = current.metas.clone();
        let mut texts = current.texts.clone();
        let mut removed = 0usize;
        for i in (0..metas.len()).rev() {
            if metas[i].source == source {
                metas.remove(i);
                texts.remove(i);
                removed += 1;
            }
        }

        if removed == 0 {
            info!(source = %source, "Document not indexed; nothing to remove");
            return Ok(false);
        }

        let vectors = self.embed_texts(&texts).await?;
        let mut index = FlatIndex::new(current.index.dimension());
        index.rebuild(&vectors)?;

        self.commit(
            IndexState {
                index,
                metas,
                texts,
            },
            self.next_uid(),
        )
        .await?;

        info!(source = %source, removed, "Removed document and rebuilt index");
        Ok(true)
    }

    /// Re-index every supported file directly inside `dir`.
    ///
    /// Files are processed in filename order. Uids continue from the
    /// high-water mark. Returns the number of chunks in the new index.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn rebuild_from_scratch(&self, dir: &Path) -> AppResult<u32> {
        let _guard = self.begin_write()?;
        self.rebuild_locked(dir).await
    }

    async fn rebuild_locked(&self, dir: &Path) -> AppResult<u32> {
        let start = Instant::now();
        let files = supported_files(dir, self.extractor.as_ref())?;

        let candidates = files
            .into_iter()
            .map(|path| {
                let source = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (source, path)
            })
            .collect();
        let documents = self.prepare_all(candidates).await;

        let vectors = self.embed_documents(&documents).await?;
        let document_count = documents.len();

        let mut next = IndexState::empty(self.embedder.dimensions());
        let next_uid = Self::extend_state(&mut next, documents, &vectors, self.next_uid())?;
        let chunks = next.len();
        self.commit(next, next_uid).await?;

        info!(
            documents = document_count,
            chunks,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rebuilt index from scratch"
        );

        Ok(chunks as u32)
    }

    /// Drop the in-memory index and delete the persisted snapshot. Source
    /// documents are left alone.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> AppResult<()> {
        let _guard = self.begin_write()?;

        let index_dir = self.config.index_dir.clone();
        tokio::task::spawn_blocking(move || snapshot::remove(&index_dir))
            .await
            .map_err(|e| AppError::Other(format!("snapshot removal task failed: {}", e)))??;

        self.install(None);
        info!("Cleared index");
        Ok(())
    }

    /// Indexed documents in order of first appearance.
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let Some(state) = self.snapshot() else {
            return Vec::new();
        };

        let mut order: Vec<&str> = Vec::new();
        let mut summaries: HashMap<&str, DocumentSummary> = HashMap::new();

        for (meta, text) in state.metas.iter().zip(&state.texts) {
            let summary = summaries.entry(meta.source.as_str()).or_insert_with(|| {
                order.push(meta.source.as_str());
                DocumentSummary {
                    source: meta.source.clone(),
                    path: meta.path.clone(),
                    chunks: 0,
                    preview: String::new(),
                }
            });
            summary.chunks += 1;
            if meta.chunk_index == 0 {
                summary.preview = preview(text);
            }
        }

        order
            .into_iter()
            .filter_map(|source| summaries.remove(source))
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.snapshot();
        IndexStats {
            loaded: state.is_some(),
            documents: state.as_ref().map(|s| s.sources().len() as u32).unwrap_or(0),
            chunks: state.as_ref().map(|s| s.len() as u32).unwrap_or(0),
            dimension: state.as_ref().map(|s| s.index.dimension()),
            next_uid: self.next_uid(),
        }
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Supported files directly inside `dir`, sorted by filename.
pub fn supported_files(dir: &Path, extractor: &dyn Extractor) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AppError::Config(format!(
            "Document directory does not exist: {}",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| extractor.supports(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(files)
}
