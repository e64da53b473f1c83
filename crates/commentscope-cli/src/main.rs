mod display;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use commentscope_core::{AnalysisStatus, ListQuery};
use commentscope_server::AppState;
use commentscope_store::DuckStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "commentscope", version, about = "Public-comment analysis API and tools")]
struct Cli {
    /// DuckDB database file. In-memory when omitted.
    #[arg(long, env = "COMMENTSCOPE_DB", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the core tables (and optionally the taxonomy tables).
    Init {
        #[arg(long)]
        taxonomy: bool,
    },
    /// Import raw submissions and analyses from Parquet or CSV files.
    Import {
        /// Directory holding `raw_submissions.{parquet,csv}` and `analyses.{parquet,csv}`.
        #[arg(long, conflicts_with_all = ["raw", "analyses"])]
        dir: Option<PathBuf>,
        #[arg(long)]
        raw: Option<PathBuf>,
        #[arg(long)]
        analyses: Option<PathBuf>,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "COMMENTSCOPE_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// List comments with the same filters as `GET /api/comments`.
    List {
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        entity: Option<String>,
        #[arg(long, default_value = "completed")]
        status: AnalysisStatus,
        #[arg(long)]
        json: bool,
    },
    /// Show one comment.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Ranked entities (precomputed taxonomy or mined).
    Entities {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Precomputed themes.
    Themes {
        #[arg(long)]
        json: bool,
    },
    /// Export every completed analysis as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Row counts per table and status.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commentscope=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("commentscope v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut store = open_store(cli.db.as_deref())?;

    match cli.command {
        Command::Init { taxonomy } => {
            if taxonomy {
                store.init_taxonomy_schema()?;
            }
            eprintln!("  Schema ready{}", if taxonomy { " (with taxonomy tables)" } else { "" });
        }
        Command::Import { dir, raw, analyses } => {
            if cli.db.is_none() {
                tracing::warn!("importing into an in-memory database; data is discarded on exit");
            }
            if let Some(dir) = dir {
                store
                    .load_all(&dir)
                    .with_context(|| format!("importing from {}", dir.display()))?;
            }
            if let Some(path) = raw {
                let n = store
                    .load_raw_submissions(&path)
                    .with_context(|| format!("importing {}", path.display()))?;
                eprintln!("  Imported {n} raw submissions");
            }
            if let Some(path) = analyses {
                let n = store
                    .load_analyses(&path)
                    .with_context(|| format!("importing {}", path.display()))?;
                eprintln!("  Imported {n} analyses");
            }
            display::print_stats(&store.stats()?);
        }
        Command::Serve { bind } => {
            let state = AppState::new(store);
            commentscope_server::serve(bind, state)
                .await
                .context("serving HTTP API")?;
        }
        Command::List {
            page,
            limit,
            search,
            entity,
            status,
            json,
        } => {
            let query = ListQuery::from_raw(
                page.as_deref(),
                limit.as_deref(),
                search.as_deref(),
                entity.as_deref(),
                status,
            );
            let page = store.list_comments(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                display::print_comment_table(&page);
            }
        }
        Command::Show { id, json } => {
            let comment = store.get_comment(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&comment)?);
            } else {
                display::print_comment_card(&comment);
            }
        }
        Command::Entities { limit, json } => {
            let source = store.probe_capabilities().entities;
            let mut entities = store.entities(source)?;
            if let Some(limit) = limit {
                entities.truncate(limit);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&entities)?);
            } else {
                display::print_entity_table(&entities, source);
            }
        }
        Command::Themes { json } => {
            let available = store.probe_capabilities().themes;
            let themes = store.themes(available)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&themes)?);
            } else {
                display::print_theme_table(&themes);
            }
        }
        Command::Export { output } => {
            let export = store.export_completed()?;
            let body = serde_json::to_string_pretty(&export)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, body)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("  Exported {} comments to {}", export.count, path.display());
                }
                None => println!("{body}"),
            }
        }
        Command::Stats => display::print_stats(&store.stats()?),
    }

    Ok(())
}

/// Open the configured database and make sure the core tables exist.
fn open_store(db: Option<&Path>) -> anyhow::Result<DuckStore> {
    let store = match db {
        Some(path) => DuckStore::open_persistent(path)
            .with_context(|| format!("opening {}", path.display()))?,
        None => DuckStore::open()?,
    };
    store.init_schema().context("creating core tables")?;
    Ok(store)
}
