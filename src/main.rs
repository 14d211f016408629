//! # CRO Search CLI (`cro`)
//!
//! ## Usage
//!
//! ```bash
//! cro --config ./config/cro.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cro init` | Create the SQLite database and schema |
//! | `cro add <file>` | Upsert experiments from a JSON array file |
//! | `cro search "<query>"` | Search experiments (keyword, vector, or hybrid) |
//! | `cro get <id>` | Show one experiment |
//! | `cro list` | Page through the catalog, newest first |
//! | `cro embed pending` | Embed experiments that have no vector yet |
//! | `cro serve` | Start the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=cro_search_core=debug`)
//! to change verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cro_search::{config, embed_cmd, experiments, migrate, search, server};

/// CRO Search: hybrid keyword and semantic search over a catalog of
/// conversion-rate-optimization experiments.
#[derive(Parser)]
#[command(
    name = "cro",
    about = "Search and browse a catalog of CRO experiments",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cro.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Upsert experiments from a JSON file.
    ///
    /// The file holds an array of objects with at least `experimentId`.
    /// Records are matched on `experimentId`; changing a searchable field
    /// clears the stored embedding.
    Add {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Search experiments.
    ///
    /// Hybrid mode (the default) needs an embedding provider; without one
    /// the search runs in keyword mode and reports the fallback.
    Search {
        /// Free-text query.
        query: String,

        /// Retrieval mode: `keyword`, `vector`, or `hybrid`.
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Maximum number of results (defaults to `[retrieval] default_limit`).
        #[arg(long, allow_hyphen_values = true)]
        limit: Option<i64>,

        /// Weight of semantic similarity in hybrid ranking, 0.0 to 1.0.
        #[arg(long)]
        vector_weight: Option<f64>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one experiment by its record id.
    Get {
        /// Record UUID.
        id: String,
    },

    /// List experiments, newest first.
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = experiments::DEFAULT_PAGE_SIZE)]
        limit: i64,
    },

    /// Manage embeddings.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed experiments whose vector is missing.
    Pending {
        /// Stop after this many experiments.
        #[arg(long)]
        limit: Option<usize>,

        /// Override `[embedding] batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Only count what would be embedded.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add { file } => {
            experiments::run_add(&cfg, &file).await?;
        }
        Commands::Search {
            query,
            mode,
            limit,
            vector_weight,
            json,
        } => {
            search::run_search(&cfg, &query, &mode, limit, vector_weight, json).await?;
        }
        Commands::Get { id } => {
            experiments::run_get(&cfg, &id).await?;
        }
        Commands::List { page, limit } => {
            experiments::run_list(&cfg, page, limit).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
