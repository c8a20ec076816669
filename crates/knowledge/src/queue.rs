//! Single-consumer queue for index writes.
//!
//! Every collaborator that wants to change the index (the watcher, the CLI,
//! an upload endpoint) sends a request through an [`IngestHandle`]. One
//! worker task owns the [`IndexManager`] write path and handles requests
//! strictly in arrival order, replying over a oneshot channel.

use crate::manager::IndexManager;
use ragdex_core::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Requests buffered before senders start waiting.
const QUEUE_CAPACITY: usize = 32;

#[derive(Debug)]
pub enum IngestRequest {
    Ingest {
        paths: Vec<PathBuf>,
        reply: oneshot::Sender<AppResult<u32>>,
    },
    Remove {
        source: String,
        reply: oneshot::Sender<AppResult<bool>>,
    },
    Rebuild {
        reply: oneshot::Sender<AppResult<u32>>,
    },
}

/// Worker side of the queue.
pub struct IngestQueue {
    manager: Arc<IndexManager>,
    data_dir: PathBuf,
    rx: mpsc::Receiver<IngestRequest>,
}

impl IngestQueue {
    /// Start the worker. It runs until every handle has been dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(manager: Arc<IndexManager>, data_dir: PathBuf) -> IngestHandle {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue = Self {
            manager,
            data_dir,
            rx,
        };
        tokio::spawn(queue.run());
        IngestHandle { tx }
    }

    async fn run(mut self) {
        debug!(data_dir = %self.data_dir.display(), "Ingest queue started");

        while let Some(request) = self.rx.recv().await {
            match request {
                IngestRequest::Ingest { paths, reply } => {
                    let result = self.manager.ingest_queued(&paths).await;
                    if let Err(e) = &result {
                        warn!(files = paths.len(), "Queued ingestion failed: {}", e);
                    }
                    let _ = reply.send(result);
                }
                IngestRequest::Remove { source, reply } => {
                    let result = self.manager.remove_queued(&source).await;
                    if let Err(e) = &result {
                        warn!(source = %source, "Queued removal failed: {}", e);
                    }
                    let _ = reply.send(result);
                }
                IngestRequest::Rebuild { reply } => {
                    let result = self.manager.rebuild_queued(&self.data_dir).await;
                    if let Err(e) = &result {
                        warn!("Queued rebuild failed: {}", e);
                    }
                    let _ = reply.send(result);
                }
            }
        }

        info!("Ingest queue stopped");
    }
}

/// Cloneable sender side of the queue.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestRequest>,
}

impl IngestHandle {
    async fn submit<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<AppResult<T>>) -> IngestRequest,
    ) -> AppResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| AppError::Other("ingest queue is not running".to_string()))?;
        rx.await
            .map_err(|_| AppError::Other("ingest queue dropped the request".to_string()))?
    }

    /// Ingest `paths`; resolves to the number of chunks added.
    pub async fn request_ingest(&self, paths: Vec<PathBuf>) -> AppResult<u32> {
        self.submit(|reply| IngestRequest::Ingest { paths, reply })
            .await
    }

    /// Remove `source` and rebuild; resolves once searches see the result.
    pub async fn request_removal(&self, source: impl Into<String>) -> AppResult<bool> {
        let source = source.into();
        self.submit(|reply| IngestRequest::Remove { source, reply })
            .await
    }

    /// Re-index the whole document directory.
    pub async fn request_rebuild(&self) -> AppResult<u32> {
        self.submit(|reply| IngestRequest::Rebuild { reply }).await
    }

    /// Whether the worker is still accepting requests.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
