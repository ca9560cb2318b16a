use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bench_harness::config::validation::validate_log_level;
use bench_harness::{Harness, HarnessConfig, HarnessReport};

/// Node benchmark harness
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of nodes to launch (overrides config)
    #[arg(short, long)]
    nodes: Option<u32>,

    /// Node executable (overrides config)
    #[arg(short, long, value_name = "PATH")]
    binary: Option<String>,

    /// Directory for node<index>.txt result logs (overrides config)
    #[arg(short, long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    /// Startup delay step between nodes in milliseconds (overrides config)
    #[arg(long)]
    base_stagger_ms: Option<u64>,

    /// Per-batch read timeout in seconds (overrides config)
    #[arg(long)]
    read_timeout_secs: Option<u64>,

    /// File with NODE<i>_PRIVATE_KEY / NODE<i>_PUBLIC_KEY entries
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Write the final per-node report to this file as YAML
    #[arg(long, value_name = "FILE")]
    report_file: Option<PathBuf>,

    /// Run duration in seconds, then stop all nodes
    #[arg(long)]
    run_duration: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_file = load_env_file(args.env_file.as_ref());

    let mut config = match &args.config {
        Some(path) => HarnessConfig::load_from_file(path)?,
        None => HarnessConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    initialize_logging(args.debug, &config.harness.log_level)?;

    info!("Starting node benchmark harness");
    if let Some(path) = &args.config {
        info!("Config file: {}", path.display());
    }
    match env_file {
        Ok(Some(path)) => info!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Environment file not loaded: {}", e),
    }

    bench_process::validate_executable(&config.harness.node_binary)
        .with_context(|| format!("Node binary is not usable: {}", config.harness.node_binary))?;

    let credentials = config.credentials.store();
    let harness = Harness::new(&config.harness, credentials.as_ref())
        .context("Failed to build node commands")?;

    info!(
        nodes = config.harness.node_count,
        binary = %config.harness.node_binary,
        stagger_ms = config.harness.base_stagger.as_millis() as u64,
        read_timeout_secs = config.harness.read_timeout.as_secs(),
        "Harness configured"
    );

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    let run_duration = args.run_duration.map(Duration::from_secs);
    tokio::spawn(async move {
        match run_duration {
            Some(duration) => {
                info!("Running for {} seconds (test mode)", duration.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(duration) => info!("Run duration elapsed"),
                    _ = setup_signal_handlers() => {}
                }
            }
            None => setup_signal_handlers().await,
        }
        info!("Stopping all nodes...");
        stopper.cancel();
    });

    let report = harness.run(cancel).await;
    print_report(&report);

    if let Some(path) = &args.report_file {
        std::fs::write(path, report.to_yaml()?)
            .with_context(|| format!("Failed to write report file: {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}

/// Loads `--env-file`, or `.env` when present. Variables already set win.
fn load_env_file(path: Option<&PathBuf>) -> Result<Option<PathBuf>, dotenvy::Error> {
    match path {
        Some(path) => dotenvy::from_path(path).map(|_| Some(path.clone())),
        None => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e),
        },
    }
}

fn apply_overrides(config: &mut HarnessConfig, args: &Args) {
    let harness = &mut config.harness;
    if let Some(nodes) = args.nodes {
        harness.node_count = nodes;
    }
    if let Some(binary) = &args.binary {
        harness.node_binary = binary.clone();
    }
    if let Some(dir) = &args.results_dir {
        harness.results_dir = dir.clone();
    }
    if let Some(ms) = args.base_stagger_ms {
        harness.base_stagger = Duration::from_millis(ms);
    }
    if let Some(secs) = args.read_timeout_secs {
        harness.read_timeout = Duration::from_secs(secs);
    }
}

fn initialize_logging(debug: bool, configured_level: &str) -> Result<()> {
    validate_log_level(configured_level)?;
    let level = if debug { "debug" } else { configured_level };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    Ok(())
}

async fn setup_signal_handlers() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let handlers = (
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
        );
        match handlers {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT signal");
                    }
                }
            }
            _ => {
                warn!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = signal::ctrl_c().await;
                info!("Received Ctrl+C signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}

fn print_report(report: &HarnessReport) {
    println!(
        "Run finished in {:.1}s: {} batches recorded, {} malformed",
        report.elapsed().num_milliseconds() as f64 / 1000.0,
        report.total_batches(),
        report.total_malformed()
    );
    for outcome in &report.outcomes {
        println!(
            "  node{}: {} batches, {} malformed, {} timeouts, {} write failures, {}{}",
            outcome.node,
            outcome.batches_written,
            outcome.malformed_batches,
            outcome.read_timeouts,
            outcome.write_failures,
            outcome.termination,
            outcome
                .exit_code
                .map(|code| format!(" (exit code {})", code))
                .unwrap_or_default()
        );
    }

    let failed = report.failed_nodes();
    if !failed.is_empty() {
        warn!("{} node(s) failed: {:?}", failed.len(), failed);
    }
}
