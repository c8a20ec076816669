//! Read-only commands: documents and stats.

use super::{print_json, Session};
use clap::Args;
use ragdex_core::{config::AppConfig, AppResult};

/// List indexed documents
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocumentsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing documents command");

        let session = Session::open(config).await?;
        let documents = session.manager.documents();

        if self.json {
            return print_json(&documents);
        }

        if documents.is_empty() {
            println!("No documents indexed");
            return Ok(());
        }

        for doc in &documents {
            println!("{} ({} chunks)", doc.source, doc.chunks);
            println!("  path:    {}", doc.path.display());
            println!("  preview: {}", doc.preview.replace('\n', " "));
        }
        println!("\n{} document(s)", documents.len());

        Ok(())
    }
}

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let session = Session::open(config).await?;
        let stats = session.manager.stats();
        let embedder = session.manager.embedder();

        if self.json {
            return print_json(&serde_json::json!({
                "loaded": stats.loaded,
                "documents": stats.documents,
                "chunks": stats.chunks,
                "dimension": stats.dimension,
                "nextUid": stats.next_uid,
                "provider": embedder.provider_name(),
                "model": embedder.model_name(),
                "dataDir": session.config.data_dir,
                "indexDir": session.config.index_dir,
            }));
        }

        println!("Index Statistics");
        println!("================");
        println!("Loaded:    {}", stats.loaded);
        println!("Documents: {}", stats.documents);
        println!("Chunks:    {}", stats.chunks);
        match stats.dimension {
            Some(dim) => println!("Dimension: {}", dim),
            None => println!("Dimension: -"),
        }
        println!("Next uid:  {}", stats.next_uid);
        println!(
            "Embedder:  {} ({})",
            embedder.provider_name(),
            embedder.model_name()
        );
        println!("Data dir:  {}", session.config.data_dir.display());
        println!("Index dir: {}", session.config.index_dir.display());

        Ok(())
    }
}
