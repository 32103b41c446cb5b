//! observatory - Food Safety & Security AI Observatory
//!
//! Collects recent papers on AI for food safety and security from Semantic
//! Scholar, arXiv and Crossref, caches them locally and lets you filter and
//! export them.
//!
//! ## Usage
//!
//! ```bash
//! observatory show --category "Robotics & Automation" --from 2024-01
//! observatory refresh
//! observatory export --format markdown --output ./reports
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use observatory::{
    cache::CacheStore,
    config::Config,
    export::{export_to_dir, ExportFormat},
    filter::parse_year_month,
    pipeline::{CacheState, Orchestrator, Startup},
    Paper, Source,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Food Safety & Security AI Observatory
#[derive(Parser)]
#[command(name = "observatory")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Directory holding the cached snapshot
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show papers, refreshing the cache when it is missing or stale
    Show {
        /// Only these categories (repeatable)
        #[arg(long)]
        category: Vec<String>,

        /// Only these sources: semanticscholar, arxiv, crossref (repeatable)
        #[arg(long)]
        source: Vec<Source>,

        /// First month shown (YYYY-MM)
        #[arg(long)]
        from: Option<String>,

        /// Last month shown, inclusive (YYYY-MM)
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of papers printed
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Persist the selection with the snapshot
        #[arg(long)]
        save: bool,
    },

    /// Fetch all sources now and replace the cache
    Refresh,

    /// Export the cached papers
    Export {
        /// json, csv or markdown
        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// Manage the cached snapshot
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show snapshot file path
    Path,
    /// Delete the snapshot
    Clear,
    /// Copy the snapshot to a file
    Save { file: PathBuf },
    /// Replace the snapshot with one saved earlier
    Load { file: PathBuf },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Show {
            category,
            source,
            from,
            to,
            limit,
            save,
        } => {
            let selection = Selection {
                categories: category,
                sources: source,
                from,
                to,
            };
            run_show(&config, selection, limit, save).await
        }
        Commands::Refresh => run_refresh(&config).await,
        Commands::Export { format, output } => run_export(&config, format, output),
        Commands::Cache { action } => handle_cache(&config, action),
    }
}

// ============================================================================
// Show / Refresh
// ============================================================================

/// Filter flags given on the command line
struct Selection {
    categories: Vec<String>,
    sources: Vec<Source>,
    from: Option<String>,
    to: Option<String>,
}

async fn run_show(config: &Config, selection: Selection, limit: usize, save: bool) -> Result<()> {
    let mut orchestrator = config.orchestrator()?;

    let background = match orchestrator.startup().context("Failed to read cached snapshot")? {
        Startup::Empty => {
            println!("No cached data, fetching the latest papers...");
            if !refresh_with_retry(&mut orchestrator).await? {
                return Ok(());
            }
            None
        }
        Startup::Fresh => {
            println!("Loaded {} papers from cache.", orchestrator.context().papers.len());
            None
        }
        Startup::Refreshing(handle) => {
            println!(
                "Cache is older than {} hours, showing cached papers while refreshing.",
                config.freshness.num_hours()
            );
            Some(handle)
        }
    };

    apply_selection(&mut orchestrator, &selection)?;
    print_papers(&orchestrator.context().visible(), limit);

    if let Some(handle) = background {
        let notification = orchestrator.complete_refresh(handle).await;
        println!("\n{}", notification);
        if orchestrator.state() == CacheState::CachedFresh {
            // The new working set starts with everything selected.
            apply_selection(&mut orchestrator, &selection)?;
            println!("Run `observatory show` again to see the updated list.");
        }
    }

    if save {
        orchestrator.save_state().context("Failed to save snapshot")?;
        println!("Selection saved.");
    }
    Ok(())
}

async fn run_refresh(config: &Config) -> Result<()> {
    let mut orchestrator = config.orchestrator()?;
    if refresh_with_retry(&mut orchestrator).await? {
        println!(
            "Saved {} papers to {}",
            orchestrator.context().papers.len(),
            orchestrator.store().path().display()
        );
    }
    Ok(())
}

/// Foreground refresh; on failure ask before trying again.
///
/// Returns false when the user gives up.
async fn refresh_with_retry(orchestrator: &mut Orchestrator) -> Result<bool> {
    loop {
        match orchestrator.refresh_foreground().await {
            Ok(count) => {
                println!("Loaded {} papers.", count);
                return Ok(true);
            }
            Err(e) => {
                eprintln!("Error loading papers: {}", e);
                print!("Try again? [y/N] ");
                io::stdout().flush()?;

                let mut input = String::new();
                io::stdin().read_line(&mut input)?;
                if !matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
                    return Ok(false);
                }
            }
        }
    }
}

fn apply_selection(orchestrator: &mut Orchestrator, selection: &Selection) -> Result<()> {
    let context = orchestrator.context_mut();
    context.selection.restrict(&selection.categories, &selection.sources);

    let from = selection.from.as_deref().map(parse_year_month).transpose()?;
    let to = selection.to.as_deref().map(parse_year_month).transpose()?;
    let bounds = context.bounds;
    context.selection.set_date_range(&bounds, from, to);
    Ok(())
}

fn print_papers(papers: &[&Paper], limit: usize) {
    if papers.is_empty() {
        println!("No papers found matching the selected criteria.");
        return;
    }

    println!("\n{} papers match:\n", papers.len());
    for paper in papers.iter().take(limit) {
        let date = paper.date.map(|d| d.to_string()).unwrap_or_default();
        println!("[{}] {}", date, paper.title);
        if !paper.authors.is_empty() {
            println!("    {}", paper.authors.join(", "));
        }
        println!("    {} | {}", paper.source, paper.categories.join(", "));
        if paper.has_link() {
            println!("    {}", paper.url);
        }
    }
    if papers.len() > limit {
        println!("\n... and {} more (use --limit)", papers.len() - limit);
    }
}

// ============================================================================
// Export
// ============================================================================

fn run_export(config: &Config, format: ExportFormat, output: PathBuf) -> Result<()> {
    let mut orchestrator = config.orchestrator()?;
    if !orchestrator.load_state().context("Failed to read cached snapshot")? {
        println!("No cached data to export. Run `observatory refresh` first.");
        return Ok(());
    }

    let path = export_to_dir(format, &output, orchestrator.context(), chrono::Utc::now())
        .context("Export failed")?;
    println!("Exported {} papers to {}", orchestrator.context().papers.len(), path.display());
    Ok(())
}

// ============================================================================
// Cache Management
// ============================================================================

fn handle_cache(config: &Config, action: CacheAction) -> Result<()> {
    let store = config.cache_store();

    match action {
        CacheAction::Path => {
            println!("Snapshot file: {}", store.path().display());
        }
        CacheAction::Clear => {
            store.clear()?;
            println!("Cache cleared.");
        }
        CacheAction::Save { file } => match store.load()? {
            Some(snapshot) => {
                CacheStore::with_path(file.clone()).save(&snapshot)?;
                println!("Saved {} papers to {}", snapshot.papers.len(), file.display());
            }
            None => println!("No cached data to save."),
        },
        CacheAction::Load { file } => {
            let snapshot = CacheStore::with_path(file.clone())
                .read()
                .with_context(|| format!("Failed to read {}", file.display()))?
                .with_context(|| format!("{} does not exist", file.display()))?;
            store.save(&snapshot)?;
            info!(file = ?file, "Snapshot restored");

            let mut orchestrator = config.orchestrator()?;
            orchestrator.load_state()?;
            println!(
                "Loaded {} papers from {} ({:?})",
                orchestrator.context().papers.len(),
                file.display(),
                orchestrator.state()
            );
        }
    }

    Ok(())
}
