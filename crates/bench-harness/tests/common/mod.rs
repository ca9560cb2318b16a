//! Helpers shared by the harness integration tests.

#![allow(dead_code)]

use bench_common::NodeIndex;
use bench_harness::{NodeCommand, WorkerSettings};
use std::path::Path;
use std::time::Duration;

pub const FAKE_NODE: &str = env!("CARGO_BIN_EXE_fake-node");

/// Command for `fake-node` as the harness would build it, plus test flags.
pub fn fake_node(index: u32, extra: &[&str]) -> NodeCommand {
    NodeCommand::new(
        NodeIndex::new(index),
        FAKE_NODE,
        vec![
            format!("priv{}", index),
            format!("pub{}", index),
            "0".to_string(),
        ],
    )
    .with_extra_args(extra.iter().copied())
}

pub fn settings(read_timeout_ms: u64, shutdown_grace_ms: u64) -> WorkerSettings {
    WorkerSettings {
        read_timeout: Duration::from_millis(read_timeout_ms),
        shutdown_grace: Duration::from_millis(shutdown_grace_ms),
    }
}

/// Parsed view of one five-line record in a node log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRecord {
    pub batch_number: u64,
    pub batch_size: u64,
    pub detect_ms: String,
    pub sign_ms: i64,
    pub call_ms: i64,
}

pub fn read_log(results_dir: &Path, index: u32) -> Vec<LoggedRecord> {
    let path = results_dir.join(format!("node{}.txt", index));
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    let values: Vec<String> = content
        .lines()
        .map(|line| {
            line.split_once(" = ")
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| panic!("unexpected log line in {}: {:?}", path.display(), line))
        })
        .collect();
    assert_eq!(values.len() % 5, 0, "partial record in {}", path.display());

    values
        .chunks(5)
        .map(|chunk| LoggedRecord {
            batch_number: chunk[0].parse().unwrap(),
            batch_size: chunk[1].parse().unwrap(),
            detect_ms: chunk[2].clone(),
            sign_ms: chunk[3].parse().unwrap(),
            call_ms: chunk[4].parse().unwrap(),
        })
        .collect()
}

pub fn batch_numbers(records: &[LoggedRecord]) -> Vec<u64> {
    records.iter().map(|r| r.batch_number).collect()
}

/// Records in a node log so far. Safe to call while the log is being written.
pub fn count_records(results_dir: &Path, index: u32) -> usize {
    std::fs::read_to_string(results_dir.join(format!("node{}.txt", index)))
        .map(|content| content.lines().filter(|l| l.starts_with("Batch number = ")).count())
        .unwrap_or(0)
}

/// Polls for a pid file written by `fake-node --pid-file`.
pub async fn wait_for_pid(path: &Path, timeout: Duration) -> u32 {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(content) = std::fs::read_to_string(path) {
            if let Ok(pid) = content.trim().parse() {
                return pid;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "pid file {} did not appear",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
