//! SKU Harvester main entry point
//!
//! This is the command-line interface for the SKU ID to SKU group harvester.

use anyhow::Context;
use clap::Parser;
use sku_harvester::config::{load_config_with_hash, Config};
use sku_harvester::crawler::harvest;
use sku_harvester::output::report_mapping;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// SKU Harvester: maps every catalog SKU ID to its SKU group
///
/// The harvester reads the SKU group landing page, visits every group page
/// with a small pool of workers, and writes a `SKU ID,SKU Group` CSV with
/// periodic checkpoints.
#[derive(Parser, Debug)]
#[command(name = "sku-harvester")]
#[command(version = "1.0.0")]
#[command(about = "Maps catalog SKU IDs to their SKU groups", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (compiled-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Print statistics for a finished mapping (default: configured output) and exit
    #[arg(long, value_name = "CSV", conflicts_with = "dry_run")]
    stats: Option<Option<PathBuf>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration before logging, which needs the log path
    let (config, config_hash) = match &cli.config {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    // Handle different modes
    if let Some(stats_path) = cli.stats {
        let _guard = setup_logging(cli.verbose, cli.quiet, None)?;
        let path = stats_path.unwrap_or_else(|| PathBuf::from(&config.output.mapping_path));
        handle_stats(&path);
        return Ok(());
    }

    if cli.dry_run {
        let _guard = setup_logging(cli.verbose, cli.quiet, None)?;
        handle_dry_run(&config);
        return Ok(());
    }

    let _guard = setup_logging(cli.verbose, cli.quiet, Some(Path::new(&config.output.log_path)))?;

    match (&cli.config, config_hash) {
        (Some(path), Some(hash)) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            hash
        ),
        _ => tracing::info!("No configuration file given, using defaults"),
    }

    handle_harvest(config).await
}

/// Sets up console logging, plus a log file when `log_path` is given
///
/// The returned guard flushes the file writer when dropped and must be held
/// for the lifetime of the program.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_path: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sku_harvester=info,warn"),
            1 => EnvFilter::new("sku_harvester=debug,info"),
            2 => EnvFilter::new("sku_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let Some(log_path) = log_path else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
        return Ok(None);
    };

    // File layer: plain text, no ANSI colors
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .with_context(|| format!("Invalid log path: {}", log_path.display()))?;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, file_name));
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(Some(guard))
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== SKU Harvester Dry Run ===\n");

    println!("Site:");
    println!("  Landing page: {}", config.site.landing_url);
    println!("  Origin: {}", config.site.origin);
    println!("  Group link segment: {}", config.site.group_path_segment);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!(
        "  Attempts per URL: {} (base delay {}ms)",
        config.http.max_retries, config.http.retry_delay_ms
    );

    println!("\nHarvest:");
    println!("  Workers: {}", config.harvest.max_workers);
    println!(
        "  Checkpoint every {} groups",
        config.harvest.checkpoint_interval
    );
    println!(
        "  Unit jitter: {}-{}ms",
        config.harvest.unit_jitter_min_ms, config.harvest.unit_jitter_max_ms
    );
    println!(
        "  Pagination delay: {}-{}ms",
        config.harvest.pagination_delay_min_ms, config.harvest.pagination_delay_max_ms
    );

    println!("\nOutput:");
    println!("  Mapping: {}", config.output.mapping_path);
    println!("  Checkpoints: {}", config.output.checkpoint_dir);
    println!("  Log: {}", config.output.log_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: reports on an existing mapping
fn handle_stats(path: &Path) {
    println!("Mapping: {}", path.display());
    report_mapping(path);
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} with {} workers",
        config.site.landing_url,
        config.harvest.max_workers
    );

    match harvest(config).await {
        Ok(summary) => {
            tracing::info!(
                "Harvest completed: {} SKU IDs from {} groups written to {}",
                summary.total_records,
                summary.groups_discovered,
                summary.output_path.display()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
