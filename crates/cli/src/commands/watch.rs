//! Watch command handler.

use super::Session;
use clap::Args;
use ragdex_core::{config::AppConfig, AppResult};
use ragdex_knowledge::DocumentWatcher;
use std::time::Duration;

/// Watch the data directory and index new files
#[derive(Args, Debug)]
pub struct WatchCommand {
    /// Quiet period in milliseconds before changes are ingested
    /// (default: `debounce_ms` from index.yaml)
    #[arg(long)]
    pub debounce_ms: Option<u64>,
}

impl WatchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing watch command");

        let session = Session::open(config).await?;
        std::fs::create_dir_all(&session.config.data_dir)?;

        let debounce = Duration::from_millis(self.debounce_ms.unwrap_or(session.config.debounce_ms));
        let watcher = DocumentWatcher::new(
            session.config.data_dir.clone(),
            debounce,
            session.queue(),
        );
        watcher.start()?;

        println!(
            "Watching {} (debounce {} ms); press Ctrl-C to stop",
            session.config.data_dir.display(),
            debounce.as_millis()
        );

        tokio::signal::ctrl_c().await?;

        watcher.stop().await;
        println!("Stopped watching");
        Ok(())
    }
}
