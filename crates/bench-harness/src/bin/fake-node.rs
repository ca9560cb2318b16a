//! Stand-in node for harness tests.
//!
//! Takes the same positional arguments as a real node and prints synthetic
//! batch blocks on stdout. Flags control how many blocks are printed and
//! which faults are injected.

use bench_telemetry::{render_block, BatchRecord, BATCH_TERMINATOR};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fake-node")]
#[command(about = "Synthetic benchmark node printing batch telemetry", long_about = None)]
struct Args {
    private_key: String,

    public_key: String,

    /// Milliseconds to sleep before printing anything
    delay_ms: u64,

    /// Number of blocks to print before exiting (0 = run until signalled)
    #[arg(long, default_value = "3")]
    batches: u64,

    /// Pause between blocks in milliseconds
    #[arg(long, default_value = "20")]
    interval_ms: u64,

    /// Event-detect lines per block
    #[arg(long, default_value = "1")]
    events_per_batch: usize,

    /// Every Nth block is printed without its timing lines
    #[arg(long)]
    malformed_every: Option<u64>,

    /// Block (1-based) that stalls halfway through
    #[arg(long)]
    stall_at: Option<u64>,

    /// How long the stalled block pauses, in milliseconds
    #[arg(long, default_value = "1000")]
    stall_ms: u64,

    /// Keep running without output after the last block
    #[arg(long)]
    hang: bool,

    /// Keep running after SIGTERM
    #[arg(long)]
    ignore_sigterm: bool,

    /// Write the process id to this file once started
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Exit code used when finishing normally or on SIGTERM
    #[arg(long, default_value = "0")]
    exit_code: i32,
}

#[tokio::main]
async fn main() {
    // stdout carries the telemetry, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    info!(
        public_key = %args.public_key,
        delay_ms = args.delay_ms,
        batches = args.batches,
        "Fake node starting"
    );

    if let Some(path) = &args.pid_file {
        if let Err(e) = write_pid_file(path) {
            warn!("Failed to write PID file {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }

    #[cfg(unix)]
    {
        let exit_code = args.exit_code;
        let ignore_sigterm = args.ignore_sigterm;
        tokio::spawn(async move {
            setup_unix_signal_handler(exit_code, ignore_sigterm).await;
        });
    }

    sleep(Duration::from_millis(args.delay_ms)).await;

    if let Err(e) = emit_batches(&args).await {
        warn!("Failed to write telemetry: {}", e);
        std::process::exit(1);
    }

    if args.hang {
        info!("All batches printed, idling");
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    info!("All batches printed, exiting");
    std::process::exit(args.exit_code);
}

async fn emit_batches(args: &Args) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut block_number = 0u64;

    while args.batches == 0 || block_number < args.batches {
        block_number += 1;
        let block = synthetic_block(block_number, args.events_per_batch.max(1));

        if args.malformed_every.is_some_and(|n| n > 0 && block_number % n == 0) {
            debug!(block = block_number, "Printing malformed block");
            let broken = format!("Event detected, delay (s): 0.5\nno timings here\n{}\n", BATCH_TERMINATOR);
            stdout.write_all(broken.as_bytes()).await?;
        } else if args.stall_at == Some(block_number) {
            let lines: Vec<&str> = block.lines().collect();
            let (head, tail) = lines.split_at(lines.len() / 2);
            stdout.write_all(format!("{}\n", head.join("\n")).as_bytes()).await?;
            stdout.flush().await?;
            debug!(block = block_number, stall_ms = args.stall_ms, "Stalling mid-block");
            sleep(Duration::from_millis(args.stall_ms)).await;
            stdout.write_all(format!("{}\n", tail.join("\n")).as_bytes()).await?;
        } else {
            stdout.write_all(block.as_bytes()).await?;
        }
        stdout.flush().await?;

        sleep(Duration::from_millis(args.interval_ms)).await;
    }

    Ok(())
}

/// Block `n` reports an event delay of `n / 4` seconds, a sign time of
/// `10 * n` ms and a call delay of `100 + n` ms.
fn synthetic_block(n: u64, events: usize) -> String {
    let detected = chrono::Utc::now().timestamp_millis();
    let sign_ms = 10 * n as i64;
    let call_delay = 100 + n as i64;

    let record = BatchRecord {
        batch_number: n,
        event_detect_delay_seconds: n as f64 / 4.0,
        batch_detected_at_ms: detected,
        batch_size: events as u64,
        batch_signed_at_ms: detected + sign_ms,
        call_completed_at_ms: detected + sign_ms + call_delay,
        call_delay_ms: call_delay,
    };
    render_block(&record, events - 1)
}

/// Written under a temporary name first so readers never see a partial pid.
fn write_pid_file(path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, format!("{}\n", std::process::id()))?;
    std::fs::rename(&tmp, path)
}

#[cfg(unix)]
async fn setup_unix_signal_handler(exit_code: i32, ignore_sigterm: bool) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to setup SIGTERM handler: {}", e);
            return;
        }
    };

    loop {
        sigterm.recv().await;
        if ignore_sigterm {
            info!("Received SIGTERM, ignoring");
            continue;
        }
        info!("Received SIGTERM, exiting");
        std::process::exit(exit_code);
    }
}
