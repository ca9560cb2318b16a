//! Node worker: one child process, one stdout stream, one result log.

use crate::command::NodeCommand;
use crate::stream::{BatchStream, StreamEvent};
use bench_common::{BenchError, BenchResult, NodeIndex};
use bench_node_state::{NodeState, NodeStateMachine};
use bench_results::ResultWriter;
use bench_telemetry::parse_batch;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long to wait for the child after SIGKILL.
const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Upper bound for reading one batch block
    pub read_timeout: Duration,
    /// Time between SIGTERM and SIGKILL, and between end of output and SIGTERM
    pub shutdown_grace: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1200),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Why a worker stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    SpawnFailed { reason: String },
    EndOfStream,
    ReadError { reason: String },
    Cancelled,
    Panicked { message: String },
}

impl Termination {
    /// Spawn failures, read errors and panics. End of output and cancellation
    /// are normal ways for a node to stop.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed { .. } | Self::ReadError { .. } | Self::Panicked { .. }
        )
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { reason } => write!(f, "spawn failed: {}", reason),
            Self::EndOfStream => write!(f, "output closed"),
            Self::ReadError { reason } => write!(f, "read error: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Panicked { message } => write!(f, "panicked: {}", message),
        }
    }
}

/// Summary of one worker's run.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub node: NodeIndex,
    pub batches_written: u64,
    pub malformed_batches: u64,
    pub read_timeouts: u64,
    pub write_failures: u64,
    pub termination: Termination,
    /// `None` when the child never started or was ended by a signal.
    pub exit_code: Option<i32>,
}

impl NodeOutcome {
    pub fn new(node: NodeIndex, termination: Termination) -> Self {
        Self {
            node,
            batches_written: 0,
            malformed_batches: 0,
            read_timeouts: 0,
            write_failures: 0,
            termination,
            exit_code: None,
        }
    }

    pub fn from_error(error: &BenchError, node: NodeIndex) -> Self {
        let termination = match error {
            BenchError::Spawn { reason, .. } => Termination::SpawnFailed {
                reason: reason.clone(),
            },
            BenchError::TaskPanic { message, .. } => Termination::Panicked {
                message: message.clone(),
            },
            other => Termination::ReadError {
                reason: other.to_string(),
            },
        };
        Self::new(node, termination)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    batches_written: u64,
    malformed_batches: u64,
    read_timeouts: u64,
    write_failures: u64,
}

/// Drives one node from spawn to termination.
///
/// The worker owns its child process, the child's stdout and the node's
/// result writer. Nothing is shared with other workers.
pub struct NodeWorker {
    command: NodeCommand,
    writer: Box<dyn ResultWriter>,
    settings: WorkerSettings,
    state: NodeStateMachine,
    counters: Counters,
}

impl NodeWorker {
    pub fn new(command: NodeCommand, writer: Box<dyn ResultWriter>, settings: WorkerSettings) -> Self {
        let state = NodeStateMachine::new(command.node);
        Self {
            command,
            writer,
            settings,
            state,
            counters: Counters::default(),
        }
    }

    pub fn node(&self) -> NodeIndex {
        self.command.node
    }

    pub fn state(&self) -> NodeState {
        self.state.current_state()
    }

    /// Spawn the node and collect batches until its output ends or `cancel`
    /// fires. The child is always reaped before this returns.
    pub async fn run(mut self, cancel: CancellationToken) -> NodeOutcome {
        let node = self.node();
        info!(
            node = %node,
            binary = %self.command.binary_path,
            "Starting node"
        );

        let mut child = match bench_process::spawn_piped(node, &self.command.binary_path, &self.command.args) {
            Ok(child) => child,
            Err(e) => {
                error!(node = %node, error = %e, "Failed to spawn node");
                self.enter_terminated("spawn failed");
                return self.outcome(NodeOutcome::from_error(&e, node).termination, None);
            }
        };

        let stderr_token = CancellationToken::new();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(node, stderr, stderr_token.clone()));
        }

        let termination = match child.stdout.take() {
            Some(stdout) => self.consume(stdout, &cancel).await,
            None => Termination::ReadError {
                reason: "stdout was not captured".to_string(),
            },
        };

        let exit_code = match termination {
            Termination::EndOfStream => wait_for_exit(node, &mut child, self.settings.shutdown_grace).await,
            _ => terminate_child(node, &mut child, self.settings.shutdown_grace).await,
        };
        stderr_token.cancel();

        self.enter_terminated(&termination.to_string());
        info!(
            node = %node,
            batches = self.counters.batches_written,
            exit_code = ?exit_code,
            reason = %termination,
            "Node worker finished"
        );
        self.outcome(termination, exit_code)
    }

    /// Read blocks from `reader` until it ends, fails or `cancel` fires.
    ///
    /// Each block read is bounded by the read timeout. A timeout with part of
    /// a block already buffered drops that part and skips to the next
    /// terminator; with nothing buffered the worker keeps waiting.
    pub async fn consume<R>(&mut self, reader: R, cancel: &CancellationToken) -> Termination
    where
        R: AsyncRead + Unpin,
    {
        let node = self.node();
        let read_timeout = self.settings.read_timeout;
        let mut stream = BatchStream::new(reader);
        if self.state() == NodeState::Starting {
            self.enter_streaming();
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(node = %node, "Batch reader cancelled");
                    return Termination::Cancelled;
                }
                result = timeout(read_timeout, stream.next_block()) => result,
            };

            match event {
                Err(_) => {
                    self.counters.read_timeouts += 1;
                    let err = BenchError::read_timeout(node, read_timeout);
                    if stream.has_partial() {
                        warn!(node = %node, error = %err, "Discarding partial batch, skipping to next terminator");
                        stream.discard_until_terminator();
                    } else {
                        warn!(node = %node, error = %err, "No output from node, still waiting");
                    }
                    let entered = self
                        .state
                        .transition_to(NodeState::Streaming, Some("read timeout".to_string()));
                    self.check_transition(entered);
                }
                Ok(Ok(StreamEvent::Block(lines))) => self.handle_block(&lines),
                Ok(Ok(StreamEvent::Malformed { reason })) => {
                    self.counters.malformed_batches += 1;
                    let err = BenchError::malformed(reason);
                    warn!(node = %node, error = %err, "Discarding batch, skipping to next terminator");
                }
                Ok(Ok(StreamEvent::Eof { partial })) => {
                    if !partial.is_empty() {
                        self.counters.malformed_batches += 1;
                        let err = BenchError::malformed(format!(
                            "output ended inside a batch ({} lines without terminator)",
                            partial.len()
                        ));
                        warn!(node = %node, error = %err, "Discarding trailing batch");
                    }
                    debug!(node = %node, lines = stream.lines_read(), "Node output closed");
                    return Termination::EndOfStream;
                }
                Ok(Err(e)) => {
                    let err = BenchError::io("read node output", &e);
                    error!(node = %node, error = %err, "Failed to read node output");
                    return Termination::ReadError {
                        reason: err.to_string(),
                    };
                }
            }
        }
    }

    fn handle_block(&mut self, lines: &[String]) {
        let node = self.node();
        let batch_number = self.counters.batches_written + 1;
        let entered = self.state.transition_to_parsing();
        self.check_transition(entered);

        let metrics = match parse_batch(lines, batch_number).and_then(|record| record.derive()) {
            Ok(metrics) => metrics,
            Err(e) => {
                self.counters.malformed_batches += 1;
                warn!(node = %node, error = %e, "Discarding malformed batch");
                self.enter_streaming();
                return;
            }
        };

        let entered = self.state.transition_to_writing();
        self.check_transition(entered);
        match self.writer.append(&metrics) {
            Ok(()) => {
                self.counters.batches_written = batch_number;
                info!(
                    node = %node,
                    batch = batch_number,
                    size = metrics.batch_size,
                    sign_ms = metrics.sign_time_ms,
                    "Recorded batch"
                );
            }
            Err(e) => {
                self.counters.write_failures += 1;
                error!(node = %node, batch = batch_number, error = %e, "Failed to write batch record");
            }
        }
        self.enter_streaming();
    }

    fn enter_streaming(&mut self) {
        let entered = self.state.transition_to_streaming();
        self.check_transition(entered);
    }

    fn enter_terminated(&mut self, reason: &str) {
        let entered = self.state.transition_to_terminated(reason);
        self.check_transition(entered);
    }

    fn check_transition(&self, result: BenchResult<()>) {
        if let Err(e) = result {
            warn!(node = %self.node(), error = %e, "Unexpected worker state transition");
        }
    }

    fn outcome(&self, termination: Termination, exit_code: Option<i32>) -> NodeOutcome {
        NodeOutcome {
            node: self.node(),
            batches_written: self.counters.batches_written,
            malformed_batches: self.counters.malformed_batches,
            read_timeouts: self.counters.read_timeouts,
            write_failures: self.counters.write_failures,
            termination,
            exit_code,
        }
    }
}

/// Forwards the child's stderr to the debug log.
async fn forward_stderr(node: NodeIndex, stderr: impl AsyncRead + Unpin, cancel: CancellationToken) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = lines.next_line() => match result {
                Ok(Some(line)) => debug!(node = %node, stream = "stderr", "{}", line),
                Ok(None) => break,
                Err(e) => {
                    debug!(node = %node, error = %e, "Stopped reading node stderr");
                    break;
                }
            }
        }
    }
}

/// Give a child whose output ended `grace` to exit on its own, then stop it.
async fn wait_for_exit(node: NodeIndex, child: &mut Child, grace: Duration) -> Option<i32> {
    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => status.code(),
        Ok(Err(e)) => {
            warn!(node = %node, error = %e, "Failed to wait for node exit");
            None
        }
        Err(_) => {
            warn!(node = %node, "Node closed its output but kept running");
            terminate_child(node, child, grace).await
        }
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL. Reaps the child.
async fn terminate_child(node: NodeIndex, child: &mut Child, grace: Duration) -> Option<i32> {
    if let Ok(Some(status)) = child.try_wait() {
        return status.code();
    }

    let Some(pid) = child.id() else {
        return None;
    };

    info!(node = %node, pid, "Sending termination signal");
    if let Err(e) = bench_process::terminate_gracefully(pid) {
        warn!(node = %node, error = %e, "Failed to send SIGTERM");
    }

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            info!(node = %node, "Node terminated gracefully");
            return status.code();
        }
        Ok(Err(e)) => {
            warn!(node = %node, error = %e, "Failed to wait for node exit");
        }
        Err(_) => {
            warn!(
                node = %node,
                pid,
                "Graceful shutdown timed out after {:?}, attempting force kill",
                grace
            );
        }
    }

    if let Err(e) = bench_process::force_kill(pid) {
        error!(node = %node, error = %e, "Force kill failed");
        if let Err(e) = child.start_kill() {
            error!(node = %node, error = %e, "Failed to kill node");
        }
    }

    match timeout(FORCE_KILL_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => status.code(),
        Ok(Err(e)) => {
            warn!(node = %node, error = %e, "Failed to reap node after force kill");
            None
        }
        Err(_) => {
            error!(node = %node, pid, "Node did not exit after force kill");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_results::MemoryResultWriter;
    use bench_telemetry::{render_block, BatchRecord};
    use tokio::io::AsyncWriteExt;

    fn record(batch_number: u64, delay: f64) -> BatchRecord {
        BatchRecord {
            batch_number,
            event_detect_delay_seconds: delay,
            batch_detected_at_ms: 100,
            batch_size: 3,
            batch_signed_at_ms: 150,
            call_completed_at_ms: 400,
            call_delay_ms: 350,
        }
    }

    fn worker(writer: &MemoryResultWriter, read_timeout: Duration) -> NodeWorker {
        let command = NodeCommand::new(NodeIndex::new(1), "unused", vec![]);
        NodeWorker::new(
            command,
            Box::new(writer.clone()),
            WorkerSettings {
                read_timeout,
                shutdown_grace: Duration::from_millis(100),
            },
        )
    }

    #[tokio::test]
    async fn test_consume_writes_sequential_batches() {
        let mut input = String::new();
        input.push_str(&render_block(&record(0, 12.0), 2));
        input.push_str("garbage without numbers\nBATCH CALL END\n");
        input.push_str(&render_block(&record(0, 0.5), 0));

        let writer = MemoryResultWriter::new();
        let mut worker = worker(&writer, Duration::from_secs(5));
        let termination = worker
            .consume(input.as_bytes(), &CancellationToken::new())
            .await;

        assert_eq!(termination, Termination::EndOfStream);
        let records = writer.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].batch_number, 1);
        assert_eq!(records[0].event_detect_delay_ms, 12000.0);
        assert_eq!(records[0].sign_time_ms, 50);
        assert_eq!(records[1].batch_number, 2);
        assert_eq!(records[1].event_detect_delay_ms, 500.0);

        let outcome = worker.outcome(termination, None);
        assert_eq!(outcome.batches_written, 2);
        assert_eq!(outcome.malformed_batches, 1);
        assert_eq!(worker.state(), NodeState::Streaming);
    }

    #[tokio::test]
    async fn test_trailing_partial_counts_as_malformed() {
        let mut input = render_block(&record(0, 1.0), 0);
        input.push_str("Event detected, delay (s): 4\n");

        let writer = MemoryResultWriter::new();
        let mut worker = worker(&writer, Duration::from_secs(5));
        worker.consume(input.as_bytes(), &CancellationToken::new()).await;

        let outcome = worker.outcome(Termination::EndOfStream, None);
        assert_eq!(outcome.batches_written, 1);
        assert_eq!(outcome.malformed_batches, 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_costs_only_its_batch() {
        let mut input = b"Event detected, delay (s): 3\nBatch detected at: \xff\xfe\n".to_vec();
        input.extend_from_slice(b"Batch size: 1\nBATCH CALL END\n");
        input.extend_from_slice(render_block(&record(0, 2.0), 0).as_bytes());

        let writer = MemoryResultWriter::new();
        let mut worker = worker(&writer, Duration::from_secs(5));
        let termination = worker
            .consume(input.as_slice(), &CancellationToken::new())
            .await;

        assert_eq!(termination, Termination::EndOfStream);
        let records = writer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].batch_number, 1);
        assert_eq!(records[0].event_detect_delay_ms, 2000.0);

        let outcome = worker.outcome(termination, None);
        assert_eq!(outcome.malformed_batches, 1);
    }

    #[tokio::test]
    async fn test_overflowing_timestamps_cost_only_their_batch() {
        let mut extreme = record(0, 1.0);
        extreme.batch_detected_at_ms = i64::MIN;
        extreme.batch_signed_at_ms = i64::MAX;
        let mut input = render_block(&extreme, 0);
        input.push_str(&render_block(&record(0, 4.0), 0));

        let writer = MemoryResultWriter::new();
        let mut worker = worker(&writer, Duration::from_secs(5));
        let termination = worker
            .consume(input.as_bytes(), &CancellationToken::new())
            .await;

        assert_eq!(termination, Termination::EndOfStream);
        let records = writer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].batch_number, 1);
        assert_eq!(records[0].event_detect_delay_ms, 4000.0);
        assert_eq!(worker.outcome(termination, None).malformed_batches, 1);
    }

    #[tokio::test]
    async fn test_timeout_resynchronises_on_next_terminator() {
        let (mut tx, rx) = tokio::io::duplex(4096);
        let writer = MemoryResultWriter::new();
        let mut worker = worker(&writer, Duration::from_millis(100));

        let feeder = tokio::spawn(async move {
            tx.write_all(b"Event detected, delay (s): 9\nBatch detected at: 1\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            // rest of the stalled block, then a complete one
            tx.write_all(b"Batch size: 2\nBATCH CALL END\n").await.unwrap();
            tx.write_all(render_block(&record(0, 2.0), 0).as_bytes())
                .await
                .unwrap();
        });

        let termination = worker.consume(rx, &CancellationToken::new()).await;
        feeder.await.unwrap();

        assert_eq!(termination, Termination::EndOfStream);
        let records = writer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].batch_number, 1);
        assert_eq!(records[0].event_detect_delay_ms, 2000.0);

        assert!(worker
            .state
            .state_history()
            .any(|t| t.to_state == NodeState::Streaming && t.reason.as_deref() == Some("read timeout")));

        let outcome = worker.outcome(termination, None);
        assert!(outcome.read_timeouts >= 1);
        assert_eq!(outcome.malformed_batches, 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_consume() {
        let (_tx, rx) = tokio::io::duplex(64);
        let writer = MemoryResultWriter::new();
        let mut worker = worker(&writer, Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let termination = timeout(Duration::from_secs(5), worker.consume(rx, &cancel))
            .await
            .unwrap();
        assert_eq!(termination, Termination::Cancelled);
        assert!(writer.records().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_outcome() {
        let writer = MemoryResultWriter::new();
        let command = NodeCommand::new(NodeIndex::new(3), "/definitely/not/a/node", vec![]);
        let worker = NodeWorker::new(command, Box::new(writer), WorkerSettings::default());

        let outcome = worker.run(CancellationToken::new()).await;
        assert_eq!(outcome.node.get(), 3);
        assert!(matches!(outcome.termination, Termination::SpawnFailed { .. }));
        assert!(outcome.termination.is_failure());
        assert_eq!(outcome.exit_code, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reaps_exited_child() {
        let writer = MemoryResultWriter::new();
        let script = format!("printf '{}'; exit 3", render_block(&record(0, 1.5), 0).replace('\n', "\\n"));
        let command = NodeCommand::new(NodeIndex::new(1), "sh", vec!["-c".into(), script]);
        let worker = NodeWorker::new(command, Box::new(writer.clone()), WorkerSettings::default());

        let outcome = worker.run(CancellationToken::new()).await;
        assert_eq!(outcome.termination, Termination::EndOfStream);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(writer.records().len(), 1);
    }
}
