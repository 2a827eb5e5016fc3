//! Catalog-Sentinel main entry point
//!
//! This is the command-line interface for the Catalog-Sentinel catalog watcher.

use anyhow::Context;
use catalog_sentinel::config::{load_config_with_hash, Config};
use catalog_sentinel::crawler::{Coordinator, Scheduler, CYCLE_DELAY};
use catalog_sentinel::output::{load_statistics, print_cycle_summary, print_statistics};
use catalog_sentinel::storage::open_store;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Sentinel: a watcher for alphabetically indexed catalogs
///
/// Catalog-Sentinel walks a listing source one index key at a time, keeps
/// every discovered entry in a SQLite database and notifies subscribers as
/// soon as a new entry shows up.
#[derive(Parser, Debug)]
#[command(name = "catalog-sentinel")]
#[command(version)]
#[command(about = "A watcher for alphabetically indexed catalogs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single crawl cycle and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    once: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["once", "stats"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["once", "dry_run"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.once {
        handle_once(&config).await?;
    } else {
        handle_continuous(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_sentinel=info,warn"),
            1 => EnvFilter::new("catalog_sentinel=debug,info"),
            2 => EnvFilter::new("catalog_sentinel=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Sentinel Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Page size: {}", config.crawler.page_size);
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);
    println!("  Dedup mode: {:?}", config.crawler.dedup_mode);
    println!(
        "  Index keys ({}): {}",
        config.crawler.index_keys.len(),
        config.crawler.index_keys.join(" ")
    );
    println!("  Cycle delay: {}s", CYCLE_DELAY.as_secs());

    println!("\nSource:");
    println!("  Listing URL: {}", config.source.listing_url);
    println!("  Sort: {}", config.source.sort);
    println!("  Entry URL template: {}", config.source.entry_url_template);
    println!("  Payload URL fragment: {}", config.source.payload_url_fragment);
    for selector in &config.source.entry_selectors {
        println!("  Entry selector: {}", selector);
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nNotifications:");
    match &config.notify.endpoint {
        Some(endpoint) => println!("  Endpoint: {}", endpoint),
        None => println!("  Endpoint: none (messages are logged)"),
    }
    println!("  Subscribers: {}", config.notify.subscribers.len());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store, 10)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --once mode: one cycle, interruptible with Ctrl-C
async fn handle_once(config: &Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config)?;
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight work");
            interrupt.cancel();
        }
    });

    let stats = coordinator.run_cycle(&cancel).await;
    print_cycle_summary(&stats);

    Ok(())
}

/// Handles the default mode: crawl continuously until Ctrl-C
async fn handle_continuous(config: &Config) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(Coordinator::from_config(config)?);
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("Interrupt received, stopping after in-flight work");
    scheduler.stop();
    scheduler.wait_idle().await;

    if let Some(stats) = scheduler.last_cycle() {
        print_cycle_summary(&stats);
    }

    Ok(())
}
