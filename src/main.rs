//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest web harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_harvest::config::{load_job, CrawlJob};
use sumi_harvest::crawler::{fetch_and_extract, Orchestrator};
use sumi_harvest::output::{load_statistics, print_statistics, render_report};
use sumi_harvest::storage::SqliteStorage;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a polite, resumable web harvester
///
/// Sumi-Harvest crawls sites from seed URLs while respecting robots.txt and
/// per-host rate limits, and stores readable text, tables and links for every
/// page in a SQLite database. Interrupted crawls resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resumable web harvester", long_about = None)]
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

    /// Ignore pages stored by earlier runs and fetch everything again
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "fetch"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "fetch"])]
    stats: bool,

    /// Fetch and extract a single URL, print it as JSON and exit
    #[arg(long, value_name = "URL", conflicts_with_all = ["dry_run", "stats"])]
    fetch: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut job = load_job(&cli.config)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", job.config_hash);

    if cli.fresh {
        job.resume = false;
    }

    if cli.dry_run {
        handle_dry_run(&job);
    } else if cli.stats {
        handle_stats(&job)?;
    } else if let Some(url) = &cli.fetch {
        handle_fetch(&job, url).await?;
    } else {
        handle_crawl(job).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved job without crawling
fn handle_dry_run(job: &CrawlJob) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Seeds ({}):", job.seeds.len());
    for seed in &job.seeds {
        println!("  - {}", seed);
    }

    println!("\nAllowed Domains ({}):", job.allowed_domains.len());
    for domain in &job.allowed_domains {
        println!("  - {}", domain);
    }

    if !job.include_patterns.is_empty() || !job.exclude_patterns.is_empty() {
        println!("\nURL Patterns:");
        for pattern in &job.include_patterns {
            println!("  + {}", pattern);
        }
        for pattern in &job.exclude_patterns {
            println!("  - {}", pattern);
        }
    }

    println!("\nLimits:");
    println!("  Max pages: {}", job.max_pages);
    println!("  Max depth: {}", job.max_depth);
    println!("  Concurrency: {}", job.concurrency);
    println!("  Per-host rate: {} req/s", job.per_host_rate);
    println!("  Timeout: {:?}", job.timeout);

    println!("\nBehaviour:");
    println!("  User agent: {}", job.user_agent);
    println!("  Respect robots.txt: {}", job.respect_robots);
    println!("  Use sitemaps: {}", job.use_sitemaps);
    println!("  Render JavaScript: {}", job.render_js);
    println!("  Store HTML: {}", job.store_html);
    println!("  Resume: {}", job.resume);

    println!("\nOutput:");
    println!("  Database: {}", job.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(job: &CrawlJob) -> anyhow::Result<()> {
    println!("Database: {}\n", job.database_path);

    let storage = SqliteStorage::new(Path::new(&job.database_path))
        .with_context(|| format!("cannot open database {}", job.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --fetch mode: one URL, no crawl, nothing stored
async fn handle_fetch(job: &CrawlJob, url: &str) -> anyhow::Result<()> {
    let record = fetch_and_extract(job, url)
        .await
        .with_context(|| format!("failed to fetch {}", url))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(job: CrawlJob) -> anyhow::Result<()> {
    if job.resume {
        tracing::info!("Starting crawl (pages stored by earlier runs are skipped)");
    } else {
        tracing::info!("Starting fresh crawl (ignoring previously stored pages)");
    }

    let storage = Arc::new(
        SqliteStorage::new(Path::new(&job.database_path))
            .with_context(|| format!("cannot open database {}", job.database_path))?,
    );
    let orchestrator = Orchestrator::new(job, storage)?;

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, letting in-flight pages finish");
            cancel.cancel();
        }
    });

    match orchestrator.run().await {
        Ok(report) => {
            println!("{}", render_report(&report));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
