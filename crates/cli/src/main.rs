//! ragdex CLI
//!
//! Main entry point for the ragdex command-line tool.
//! Maintains a local document index and answers retrieval queries against it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    ClearCommand, DocumentsCommand, IngestCommand, QueryCommand, RebuildCommand, RemoveCommand,
    StatsCommand, WatchCommand,
};
use ragdex_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// ragdex - local document retrieval with query expansion
#[derive(Parser, Debug)]
#[command(name = "ragdex")]
#[command(about = "Local document retrieval with query expansion", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGDEX_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RAGDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index documents (default: every supported file in the data directory)
    Ingest(IngestCommand),

    /// Search the index
    Query(QueryCommand),

    /// Remove a document and rebuild the index
    Remove(RemoveCommand),

    /// Re-index the data directory from scratch
    Rebuild(RebuildCommand),

    /// List indexed documents
    Documents(DocumentsCommand),

    /// Show index statistics
    Stats(StatsCommand),

    /// Delete the index (source documents are kept)
    Clear(ClearCommand),

    /// Watch the data directory and index new files until Ctrl-C
    Watch(WatchCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Query(_) => "query",
            Commands::Remove(_) => "remove",
            Commands::Rebuild(_) => "rebuild",
            Commands::Documents(_) => "documents",
            Commands::Stats(_) => "stats",
            Commands::Clear(_) => "clear",
            Commands::Watch(_) => "watch",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("ragdex starting");
    tracing::debug!("Workspace: {:?}", config.workspace);

    config.ensure_state_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Remove(cmd) => cmd.execute(&config).await,
        Commands::Rebuild(cmd) => cmd.execute(&config).await,
        Commands::Documents(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Clear(cmd) => cmd.execute(&config).await,
        Commands::Watch(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
