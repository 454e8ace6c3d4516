use anyhow::{Context, Result};
use clap::ArgMatches;
use seedcrawl_scanner::config::DEFAULT_TIMEOUT_SECS;
use seedcrawl_scanner::{Coordinator, CrawlConfig, DiscoveredSet, HttpFetcher};
use std::time::Duration;
use tracing::Level;

/// Seed URLs in the order they were given on the command line
pub fn collect_seeds(args: &ArgMatches) -> Vec<String> {
    args.get_many::<String>("URL")
        .map(|urls| urls.cloned().collect())
        .unwrap_or_default()
}

/// Map `-q` / `-v` flags to the maximum log level. Warnings (failed fetches)
/// show by default.
pub fn log_level(quiet: bool, verbose: u8) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Logs go to stderr so the report on stdout stays clean
pub fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub async fn crawl_seeds(seeds: Vec<String>, config: CrawlConfig) -> Result<DiscoveredSet> {
    let fetcher = HttpFetcher::new(&config).context("Failed to create HTTP client")?;
    Ok(Coordinator::with_config(fetcher, config).run(seeds).await)
}

pub fn render_report(discovered: &DiscoveredSet) -> String {
    let mut report = format!("\nFound {} unique urls:\n\n", discovered.len());
    for link in discovered.sorted() {
        report.push_str(&format!("-{}\n", link));
    }
    report
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let seeds = collect_seeds(args);
    let timeout = args
        .get_one::<u64>("timeout")
        .copied()
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let config = CrawlConfig::new().with_timeout(Duration::from_secs(timeout));

    let discovered = crawl_seeds(seeds, config).await?;
    print!("{}", render_report(&discovered));
    Ok(())
}
