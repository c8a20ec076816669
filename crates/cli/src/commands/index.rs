//! Index-writing commands: ingest, remove, rebuild and clear.
//!
//! Writes go through the ingest queue so they are serialized the same way
//! watcher-triggered ingestion is.

use super::{print_json, Session};
use clap::Args;
use ragdex_core::{config::AppConfig, AppResult};
use ragdex_knowledge::manager::supported_files;
use ragdex_knowledge::FileExtractor;
use std::path::PathBuf;

/// Index documents
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files to index (default: every supported file in the data directory)
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let session = Session::open(config).await?;
        let paths = if self.paths.is_empty() {
            supported_files(&session.config.data_dir, &FileExtractor)?
        } else {
            self.paths.clone()
        };
        tracing::debug!("{} candidate file(s)", paths.len());

        let added = session.queue().request_ingest(paths).await?;
        let stats = session.manager.stats();

        if self.json {
            print_json(&serde_json::json!({
                "chunksAdded": added,
                "documents": stats.documents,
                "chunks": stats.chunks,
            }))?;
        } else if added == 0 {
            println!("Nothing new to index ({} documents already indexed)", stats.documents);
        } else {
            println!(
                "Indexed {} new chunk(s); index now holds {} documents in {} chunks",
                added, stats.documents, stats.chunks
            );
        }

        Ok(())
    }
}

/// Remove a document from the index
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Source filename as shown by `ragdex documents`
    pub source: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RemoveCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing remove command for '{}'", self.source);

        let session = Session::open(config).await?;
        let removed = session.queue().request_removal(self.source.clone()).await?;

        if self.json {
            print_json(&serde_json::json!({
                "source": self.source,
                "removed": removed,
            }))?;
        } else if removed {
            println!("Removed '{}'", self.source);
        } else {
            println!("'{}' is not in the index", self.source);
        }

        Ok(())
    }
}

/// Re-index the data directory from scratch
#[derive(Args, Debug)]
pub struct RebuildCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RebuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing rebuild command");

        let session = Session::open(config).await?;
        let chunks = session.queue().request_rebuild().await?;
        let stats = session.manager.stats();

        if self.json {
            print_json(&serde_json::json!({
                "documents": stats.documents,
                "chunks": chunks,
            }))?;
        } else {
            println!(
                "Rebuilt index from {}: {} documents, {} chunks",
                session.config.data_dir.display(),
                stats.documents,
                chunks
            );
        }

        Ok(())
    }
}

/// Delete the index
#[derive(Args, Debug)]
pub struct ClearCommand {}

impl ClearCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clear command");

        let session = Session::open(config).await?;
        session.manager.clear().await?;

        println!("Index cleared; source documents were left in place");
        Ok(())
    }
}
