//! Polite-Fetch main entry point
//!
//! This is the command-line interface for the Polite-Fetch engine.

use clap::Parser;
use futures::stream::{self, StreamExt};
use polite_fetch::config::{load_config_with_hash, Config};
use polite_fetch::retry::set_default_max_retries;
use polite_fetch::{FetchStrategy, Orchestrator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Polite-Fetch: a polite, concurrent web fetcher
///
/// Polite-Fetch downloads pages while respecting robots.txt, per-domain
/// concurrency limits and randomized request spacing, retrying transient
/// failures with exponential backoff.
#[derive(Parser, Debug)]
#[command(name = "polite-fetch")]
#[command(version = "1.0.0")]
#[command(about = "A polite, concurrent web fetcher", long_about = None)]
struct Cli {
    /// URLs to fetch
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Fetch with the headless browser
    #[arg(long, conflicts_with = "http")]
    browser: bool,

    /// Fetch with the plain HTTP client
    #[arg(long, conflicts_with = "browser")]
    http: bool,

    /// Maximum number of fetches in flight across all domains
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be fetched without fetching
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn strategy(&self) -> FetchStrategy {
        if self.browser {
            FetchStrategy::ScriptedBrowser
        } else if self.http {
            FetchStrategy::SimpleHttp
        } else {
            FetchStrategy::Auto
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    set_default_max_retries(config.retry.max_retries);

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }

    handle_fetch(config, &cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("polite_fetch=info,warn"),
            1 => EnvFilter::new("polite_fetch=debug,info"),
            2 => EnvFilter::new("polite_fetch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration and targets
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Polite-Fetch Dry Run ===\n");

    println!("Fetcher:");
    println!("  Strategy: {:?}", cli.strategy());
    println!("  Browser by default: {}", config.fetcher.use_browser_by_default);
    println!("  HTTP timeout: {:.1}s", config.fetcher.timeout_seconds);
    println!(
        "  Browser timeout: {:.1}s (headless: {})",
        config.fetcher.browser_timeout_seconds, config.fetcher.browser_headless
    );
    println!("  User agents: {}", config.fetcher.user_agent_pool().len());
    println!(
        "  Proxy: {}",
        config.fetcher.proxy_url.as_deref().unwrap_or("none")
    );

    println!("\nRate limit:");
    println!(
        "  Per-domain concurrency: {}",
        config.rate_limit.max_concurrent_requests_per_domain
    );
    println!(
        "  Delay between requests: {:.1}s - {:.1}s",
        config.rate_limit.min_delay_seconds, config.rate_limit.max_delay_seconds
    );
    println!("  Overall concurrency: {}", cli.concurrency);

    println!("\nRetry:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!(
        "  Backoff: {:.2}s x{:.1} (jitter {:.0}%)",
        config.retry.base_delay_seconds,
        config.retry.backoff_multiplier,
        config.retry.jitter_fraction * 100.0
    );
    println!("  Retry on: {:?}", config.retry.retry_on);

    println!("\nRobots.txt:");
    println!("  Respect: {}", config.robots.respect);
    println!("  User agent: {}", config.robots.user_agent);
    println!("  Cache size: {}", config.robots.cache_size);

    println!("\nURLs ({}):", cli.urls.len());
    for url in &cli.urls {
        match polite_fetch::parse_fetch_url(url) {
            Ok((_, domain)) => println!("  - {} [{}]", url, domain),
            Err(e) => println!("  - {} (invalid: {})", url, e),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Fetches every URL and prints one line per result
async fn handle_fetch(config: Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!("Failed to initialize fetcher: {}", e);
            return Err(e.into());
        }
    };

    let strategy = cli.strategy();
    tracing::info!(
        "Fetching {} URLs (concurrency: {}, strategy: {:?})",
        cli.urls.len(),
        cli.concurrency,
        strategy
    );

    let orchestrator = &orchestrator;
    let results: Vec<_> = stream::iter(cli.urls.iter())
        .map(|url| async move { (url, orchestrator.fetch(url, Some(strategy)).await) })
        .buffer_unordered(cli.concurrency as usize)
        .collect()
        .await;

    let mut succeeded = 0usize;
    for (url, result) in &results {
        let size = result.body().map(str::len).unwrap_or(0);
        if result.is_success() {
            succeeded += 1;
        }
        println!(
            "{}\t{}\t{}\t{}",
            result.status_code(),
            url,
            result.resolved_url(),
            size
        );
    }

    orchestrator.shutdown().await;

    tracing::info!("Fetched {}/{} URLs successfully", succeeded, results.len());
    Ok(())
}
