//! Query command handler.

use super::{print_json, Session};
use clap::Args;
use ragdex_core::{config::AppConfig, AppResult};
use ragdex_knowledge::QueryEngine;

/// Search the index
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to retrieve (default: `top_k` from index.yaml)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command");

        let session = Session::open(config).await?;
        let k = self.top_k.unwrap_or(session.config.top_k);
        let engine = QueryEngine::new(
            session.manager.clone(),
            session.manager.embedder(),
            session.config.similarity_threshold,
        );

        tracing::debug!("Expanded query: {}", engine.expander().expand(&self.query));
        let hits = engine.search(&self.query, k).await?;

        if self.json {
            return print_json(&hits);
        }

        if hits.is_empty() {
            println!("No results above threshold {:.2}", engine.threshold());
            return Ok(());
        }

        for (rank, hit) in hits.iter().enumerate() {
            println!(
                "{}. [{:.3}] {} #{}",
                rank + 1,
                hit.score,
                hit.source,
                hit.chunk_index
            );
            println!("   {}", hit.text.replace('\n', "\n   "));
            println!();
        }

        Ok(())
    }
}
