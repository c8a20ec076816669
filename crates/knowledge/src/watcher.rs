//! Directory watcher that feeds new documents into the ingest queue.
//!
//! The `notify` callback runs on the backend's own thread and only forwards
//! paths over a channel. A tokio task collects them, waits for the debounce
//! window to pass, and hands the paths that still exist to the
//! [`IngestHandle`]. The window is armed by the first path and is not pushed
//! back by later ones, so a steady stream of writes still flushes regularly.

use crate::extract::is_supported;
use crate::queue::IngestHandle;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use ragdex_core::{AppError, AppResult};
use serde::Serialize;
use std::collections::BTreeSet;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where the debounce state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchPhase {
    /// Nothing pending
    Idle,
    /// First path recorded; the timer is armed
    PendingCollect,
    /// More paths joined the pending set while the timer runs
    Debouncing,
    /// Pending paths handed to the ingest queue
    Flushing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatcherStatus {
    pub active: bool,
    pub data_dir: PathBuf,
    pub phase: WatchPhase,
    pub pending: usize,
}

/// Pending paths plus the debounce deadline.
#[derive(Debug)]
struct Debouncer {
    phase: WatchPhase,
    pending: BTreeSet<PathBuf>,
    deadline: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            phase: WatchPhase::Idle,
            pending: BTreeSet::new(),
            deadline: None,
            window,
        }
    }

    /// Add a path; arms the timer if it is not already running.
    fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
            self.phase = WatchPhase::PendingCollect;
        } else {
            self.phase = WatchPhase::Debouncing;
        }
    }

    /// Snapshot and clear the pending set.
    fn take(&mut self) -> Vec<PathBuf> {
        self.phase = WatchPhase::Flushing;
        self.deadline = None;
        mem::take(&mut self.pending).into_iter().collect()
    }

    fn finish_flush(&mut self) {
        self.phase = WatchPhase::Idle;
    }

    fn reset(&mut self) {
        self.phase = WatchPhase::Idle;
        self.pending.clear();
        self.deadline = None;
    }
}

struct Running {
    watcher: RecommendedWatcher,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Watches one document directory.
pub struct DocumentWatcher {
    data_dir: PathBuf,
    ingest: IngestHandle,
    state: Arc<Mutex<Debouncer>>,
    running: Mutex<Option<Running>>,
}

impl DocumentWatcher {
    pub fn new(data_dir: impl Into<PathBuf>, debounce: Duration, ingest: IngestHandle) -> Self {
        Self {
            data_dir: data_dir.into(),
            ingest,
            state: Arc::new(Mutex::new(Debouncer::new(debounce))),
            running: Mutex::new(None),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_active(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn status(&self) -> WatcherStatus {
        let state = self.state.lock();
        WatcherStatus {
            active: self.is_active(),
            data_dir: self.data_dir.clone(),
            phase: state.phase,
            pending: state.pending.len(),
        }
    }

    /// Start watching. Creates the directory if needed. Calling this on a
    /// running watcher logs a warning and does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> AppResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            warn!(data_dir = %self.data_dir.display(), "Watcher already running");
            return Ok(());
        }

        std::fs::create_dir_all(&self.data_dir)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    for path in event.paths {
                        if is_supported(&path) && !path.is_dir() {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            },
            notify::Config::default(),
        )
        .map_err(|e| AppError::Other(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&self.data_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                AppError::Other(format!(
                    "Failed to watch {}: {}",
                    self.data_dir.display(),
                    e
                ))
            })?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = spawn_debounce_task(rx, shutdown_rx, self.state.clone(), self.ingest.clone());

        *running = Some(Running {
            watcher,
            shutdown,
            task,
        });

        info!(data_dir = %self.data_dir.display(), "Watching for documents");
        Ok(())
    }

    /// Stop watching and wait for the debounce task to exit. Paths still
    /// pending are dropped; once this returns no flush will fire. Stopping an
    /// idle watcher does nothing.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        drop(running.watcher);
        let _ = running.shutdown.send(true);
        if let Err(e) = running.task.await {
            warn!("Watcher task ended abnormally: {}", e);
        }

        self.state.lock().reset();
        info!(data_dir = %self.data_dir.display(), "Stopped watching");
    }
}

fn spawn_debounce_task(
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    mut shutdown: watch::Receiver<bool>,
    state: Arc<Mutex<Debouncer>>,
    ingest: IngestHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let deadline = state.lock().deadline;

            tokio::select! {
                _ = shutdown.changed() => break,
                received = rx.recv() => match received {
                    Some(path) => {
                        debug!(path = %path.display(), "Document change detected");
                        state.lock().record(path, Instant::now());
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let paths = state.lock().take();
                    flush(&ingest, paths).await;
                    state.lock().finish_flush();
                }
            }
        }

        let dropped = state.lock().pending.len();
        if dropped > 0 {
            debug!(dropped, "Discarding pending paths on shutdown");
        }
    })
}

async fn flush(ingest: &IngestHandle, paths: Vec<PathBuf>) {
    let paths: Vec<PathBuf> = paths.into_iter().filter(|p| p.is_file()).collect();
    if paths.is_empty() {
        debug!("Nothing left to ingest after debounce");
        return;
    }

    let files = paths.len();
    match ingest.request_ingest(paths).await {
        Ok(chunks) => info!(files, chunks, "Ingested changed documents"),
        Err(e) => warn!(files, "Ingestion of changed documents failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::manager::IndexManager;
    use crate::queue::IngestQueue;
    use std::fs;
    use tempfile::TempDir;

    const WINDOW: Duration = Duration::from_millis(150);

    fn setup() -> (TempDir, Arc<IndexManager>, IngestHandle) {
        let dir = TempDir::new().unwrap();
        let config = IndexConfig::default().resolved(dir.path());
        fs::create_dir_all(&config.data_dir).unwrap();
        let data_dir = config.data_dir.clone();
        let manager = Arc::new(IndexManager::from_config(config).unwrap());
        let handle = IngestQueue::spawn(manager.clone(), data_dir);
        (dir, manager, handle)
    }

    async fn wait_for_chunks(manager: &IndexManager, chunks: u32) -> bool {
        for _ in 0..100 {
            if manager.stats().chunks >= chunks {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn test_timer_armed_once() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        assert_eq!(debouncer.phase, WatchPhase::Idle);

        debouncer.record(PathBuf::from("/d/a.txt"), start);
        assert_eq!(debouncer.phase, WatchPhase::PendingCollect);
        debouncer.record(PathBuf::from("/d/b.txt"), start + Duration::from_millis(100));
        debouncer.record(PathBuf::from("/d/a.txt"), start + Duration::from_millis(120));

        assert_eq!(debouncer.phase, WatchPhase::Debouncing);
        assert_eq!(debouncer.deadline, Some(start + WINDOW));
        assert_eq!(debouncer.pending.len(), 2);

        let taken = debouncer.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(debouncer.phase, WatchPhase::Flushing);
        assert!(debouncer.deadline.is_none());

        debouncer.finish_flush();
        assert_eq!(debouncer.phase, WatchPhase::Idle);
    }

    #[tokio::test]
    async fn test_burst_is_coalesced_into_one_flush() {
        let (dir, manager, handle) = setup();
        let state = Arc::new(Mutex::new(Debouncer::new(WINDOW)));
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = spawn_debounce_task(rx, shutdown_rx, state.clone(), handle);

        let data_dir = dir.path().join("data");
        for name in ["a.txt", "b.txt", "c.txt"] {
            let path = data_dir.join(name);
            fs::write(&path, format!("contents of {}", name)).unwrap();
            tx.send(path.clone()).unwrap();
            tx.send(path).unwrap();
        }
        tx.send(data_dir.join("vanished.txt")).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.lock().pending.len(), 4);
        assert!(!manager.is_loaded());

        assert!(wait_for_chunks(&manager, 3).await);
        assert_eq!(manager.stats().documents, 3);
        assert_eq!(state.lock().phase, WatchPhase::Idle);

        let _ = shutdown.send(true);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_flush_after_shutdown() {
        let (dir, manager, handle) = setup();
        let state = Arc::new(Mutex::new(Debouncer::new(WINDOW)));
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = spawn_debounce_task(rx, shutdown_rx, state.clone(), handle);

        let path = dir.path().join("data").join("late.txt");
        fs::write(&path, "should never be indexed").unwrap();
        tx.send(path).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let _ = shutdown.send(true);
        task.await.unwrap();

        tokio::time::sleep(WINDOW * 3).await;
        assert!(!manager.is_loaded());
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let (dir, _manager, handle) = setup();
        let watcher = DocumentWatcher::new(dir.path().join("data"), WINDOW, handle);

        watcher.stop().await;
        assert!(!watcher.status().active);

        watcher.start().unwrap();
        watcher.start().unwrap();
        assert!(watcher.is_active());

        watcher.stop().await;
        watcher.stop().await;
        let status = watcher.status();
        assert!(!status.active);
        assert_eq!(status.phase, WatchPhase::Idle);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn test_new_file_is_ingested() {
        let (dir, manager, handle) = setup();
        let watcher = DocumentWatcher::new(dir.path().join("data"), WINDOW, handle);
        watcher.start().unwrap();

        fs::write(dir.path().join("data").join("new.md"), "# Notice\n\nnew policy").unwrap();
        fs::write(dir.path().join("data").join("ignored.pdf"), "binary").unwrap();

        assert!(wait_for_chunks(&manager, 1).await);
        watcher.stop().await;

        let docs = manager.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "new.md");
    }
    #[tokio::test]
    async fn test_renamed_file_is_ingested_under_new_name() {
        let (dir, manager, handle) = setup();
        let data_dir = dir.path().join("data");

        // One file staged outside the watched directory, one staged inside it
        // under an unsupported name.
        let outside = dir.path().join("incoming.txt");
        fs::write(&outside, "moved in from elsewhere").unwrap();
        let draft = data_dir.join("draft.tmp");
        fs::write(&draft, "# Draft\n\nfinished upload").unwrap();

        let watcher = DocumentWatcher::new(&data_dir, WINDOW, handle);
        watcher.start().unwrap();

        fs::rename(&outside, data_dir.join("x.txt")).unwrap();
        fs::rename(&draft, data_dir.join("y.md")).unwrap();

        assert!(wait_for_chunks(&manager, 2).await);
        tokio::time::sleep(WINDOW * 2).await;
        watcher.stop().await;

        let sources: Vec<String> = manager.documents().into_iter().map(|d| d.source).collect();
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&"x.txt".to_string()));
        assert!(sources.contains(&"y.md".to_string()));
        assert!(!sources.iter().any(|s| s == "incoming.txt" || s == "draft.tmp"));
    }
}
