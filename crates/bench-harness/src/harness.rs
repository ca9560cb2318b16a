//! Runs one worker per node and collects their outcomes.

use crate::command::{build_commands, NodeCommand};
use crate::config::HarnessOptions;
use crate::credentials::CredentialStore;
use crate::worker::{NodeOutcome, NodeWorker, WorkerSettings};
use bench_common::{BenchError, BenchResult, NodeIndex};
use bench_results::{FileResultWriter, ResultWriter};
use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Harness {
    commands: Vec<NodeCommand>,
    results_dir: PathBuf,
    settings: WorkerSettings,
}

impl Harness {
    /// Build every node command up front. Missing credentials fail here,
    /// before any process is started.
    pub fn new(options: &HarnessOptions, credentials: &dyn CredentialStore) -> BenchResult<Self> {
        let commands = build_commands(
            &options.node_binary,
            options.node_count,
            options.base_stagger,
            credentials,
        )?;

        Ok(Self::from_commands(
            commands,
            &options.results_dir,
            WorkerSettings {
                read_timeout: options.read_timeout,
                shutdown_grace: options.shutdown_grace,
            },
        ))
    }

    pub fn from_commands(
        commands: Vec<NodeCommand>,
        results_dir: impl AsRef<Path>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            commands,
            results_dir: results_dir.as_ref().to_path_buf(),
            settings,
        }
    }

    pub fn commands(&self) -> &[NodeCommand] {
        &self.commands
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Run all nodes, writing to `<results_dir>/node<index>.txt`.
    pub async fn run(self, cancel: CancellationToken) -> HarnessReport {
        let results_dir = self.results_dir.clone();
        self.run_with(cancel, move |node| {
            Box::new(FileResultWriter::new(&results_dir, node)) as Box<dyn ResultWriter>
        })
        .await
    }

    /// Run all nodes with writers from `make_writer`.
    ///
    /// Each worker gets a child of `cancel`, so cancelling it stops every
    /// node. Returns once all workers have finished.
    pub async fn run_with<F>(self, cancel: CancellationToken, mut make_writer: F) -> HarnessReport
    where
        F: FnMut(NodeIndex) -> Box<dyn ResultWriter>,
    {
        let started_at = Utc::now();
        info!(
            nodes = self.commands.len(),
            results_dir = %self.results_dir.display(),
            "Starting benchmark harness"
        );

        let mut handles = Vec::with_capacity(self.commands.len());
        for command in self.commands {
            let node = command.node;
            let worker = NodeWorker::new(command, make_writer(node), self.settings);
            let handle = tokio::spawn(worker.run(cancel.child_token()));
            handles.push(async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let err = BenchError::task_panic(node, panic_message(e));
                        error!(node = %node, error = %err, "Node worker failed");
                        NodeOutcome::from_error(&err, node)
                    }
                }
            });
        }

        let outcomes = join_all(handles).await;
        let report = HarnessReport {
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            batches = report.total_batches(),
            failed_nodes = report.failed_nodes().len(),
            "Benchmark harness finished"
        );
        report
    }
}

fn panic_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task cancelled".to_string();
    }

    let panic_info = error.into_panic();
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Per-node outcomes of a run, in node order.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub outcomes: Vec<NodeOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarnessReport {
    pub fn total_batches(&self) -> u64 {
        self.outcomes.iter().map(|o| o.batches_written).sum()
    }

    pub fn total_malformed(&self) -> u64 {
        self.outcomes.iter().map(|o| o.malformed_batches).sum()
    }

    pub fn failed_nodes(&self) -> Vec<NodeIndex> {
        self.outcomes
            .iter()
            .filter(|o| o.termination.is_failure())
            .map(|o| o.node)
            .collect()
    }

    pub fn outcome(&self, node: NodeIndex) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|o| o.node == node)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// YAML rendering of the whole report.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize harness report")
    }
}
