//! Binary entrypoint: a thin CLI over the watcher library.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use listing_watcher::bootstrap;
use listing_watcher::model::WatcherConfig;
use listing_watcher::watcher::CheckOutcome;

#[derive(Parser)]
#[command(
    name = "listing-watcher",
    about = "Watches classifieds feeds and notifies about new listings."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the check cycle for one watcher.
    Check { name: String },
    /// Run the check cycle for every stored watcher.
    CheckAll,
    /// Register a new watcher from a JSON config file.
    Create { file: PathBuf },
    /// Replace a stored watcher with the config from a JSON file.
    Update { name: String, file: PathBuf },
    /// Delete a watcher and its stored baseline.
    Delete { name: String },
    /// List stored watcher names.
    List,
    /// List registered data sources and their parameter schemas.
    Sources,
    /// List registered notification platforms and their parameter schemas.
    Platforms,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_watcher=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

fn load_config(file: &Path) -> anyhow::Result<WatcherConfig> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let config =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    Ok(config)
}

fn report(name: &str, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Initialized { item_count } => {
            println!("{name}: baseline initialized with {item_count} items")
        }
        CheckOutcome::Unchanged => println!("{name}: no new items"),
        CheckOutcome::Notified { new_items } => {
            println!("{name}: notified about {new_items} new items")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let watcher = bootstrap::watcher()?;

    match cli.command {
        Command::Check { name } => {
            let outcome = watcher.check(&name).await?;
            report(&name, &outcome);
        }
        Command::CheckAll => {
            let reports = watcher.check_all().await?;
            let mut failures = 0usize;
            for r in &reports {
                match &r.outcome {
                    Ok(outcome) => report(&r.watcher, outcome),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: failed: {e}", r.watcher);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {} watcher checks failed", reports.len());
            }
        }
        Command::Create { file } => {
            let config = load_config(&file)?;
            watcher.create(&config)?;
            println!("created watcher '{}'", config.name);
        }
        Command::Update { name, file } => {
            let config = load_config(&file)?;
            watcher.update(&name, &config)?;
            println!("updated watcher '{}'", config.name);
        }
        Command::Delete { name } => {
            watcher.delete(&name)?;
            println!("deleted watcher '{name}'");
        }
        Command::List => {
            for name in watcher.list()? {
                println!("{name}");
            }
        }
        Command::Sources => {
            for name in watcher.sources().names() {
                let schema = watcher.sources().parameter_schema(name)?;
                println!("{name}:\n{}", serde_json::to_string_pretty(&schema)?);
            }
        }
        Command::Platforms => {
            for name in watcher.platforms().names() {
                let schema = watcher.platforms().parameter_schema(name)?;
                println!("{name}:\n{}", serde_json::to_string_pretty(&schema)?);
            }
        }
    }

    Ok(())
}
