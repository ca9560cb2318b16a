//! Error types for the benchmark harness.
//!
//! Errors fall into two groups. `Configuration` is global: it is raised while
//! commands are being built and aborts the harness before any node process is
//! spawned. Everything else is scoped to a single node worker and never
//! crosses into sibling workers:
//!
//! - `Spawn` ends the worker that raised it.
//! - `ReadTimeout` and `MalformedBatch` are recovered per batch.
//! - `Io` loses one record but the worker keeps going.
//!
//! ```rust
//! use bench_common::{BenchError, BenchResult};
//!
//! fn check(count: u32) -> BenchResult<()> {
//!     if count == 0 {
//!         return Err(BenchError::configuration("node count must be at least 1"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(0).is_err());
//! ```

use crate::types::NodeIndex;
use std::time::Duration;
use thiserror::Error;

/// Result type for harness operations.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Main error type for the harness.
#[derive(Error, Debug, Clone)]
pub enum BenchError {
    /// Missing credentials or otherwise unusable configuration.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// The node process could not be started.
    #[error("Spawn failed for node {node}: {reason}")]
    Spawn { node: NodeIndex, reason: String },

    /// No batch terminator arrived within the read timeout.
    #[error("Read timeout for node {node} after {timeout:?}")]
    ReadTimeout { node: NodeIndex, timeout: Duration },

    /// A batch block could not be turned into a record.
    #[error("Malformed batch: {reason}")]
    MalformedBatch { reason: String },

    /// Result file could not be created or written.
    #[error("I/O error: {context}: {reason}")]
    Io { context: String, reason: String },

    /// A worker attempted a state transition its state machine forbids.
    #[error("Invalid state for node {node}: expected {expected}, got {actual}")]
    InvalidState {
        node: NodeIndex,
        expected: String,
        actual: String,
    },

    /// The child process could not be stopped.
    #[error("Termination failed for pid {pid}: {reason}")]
    Termination { pid: u32, reason: String },

    #[error("Worker task panicked for node {node}: {message}")]
    TaskPanic { node: NodeIndex, message: String },
}

impl BenchError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn spawn(node: NodeIndex, reason: impl Into<String>) -> Self {
        Self::Spawn {
            node,
            reason: reason.into(),
        }
    }

    pub fn read_timeout(node: NodeIndex, timeout: Duration) -> Self {
        Self::ReadTimeout { node, timeout }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedBatch {
            reason: reason.into(),
        }
    }

    /// Wraps an `std::io::Error` with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: &std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            reason: source.to_string(),
        }
    }

    pub fn invalid_state(
        node: NodeIndex,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            node,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn termination(pid: u32, reason: impl Into<String>) -> Self {
        Self::Termination {
            pid,
            reason: reason.into(),
        }
    }

    pub fn task_panic(node: NodeIndex, message: impl Into<String>) -> Self {
        Self::TaskPanic {
            node,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = BenchError::configuration("missing NODE3_PRIVATE_KEY");
        assert!(matches!(error, BenchError::Configuration { .. }));
        assert_eq!(
            format!("{}", error),
            "Configuration error: missing NODE3_PRIVATE_KEY"
        );

        let error = BenchError::spawn(NodeIndex::new(2), "executable not found");
        assert!(format!("{}", error).contains("Spawn failed for node 2"));
    }

    #[test]
    fn test_io_error_wrapping() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = BenchError::io("open results/node1.txt", &source);
        let message = error.to_string();
        assert!(message.contains("open results/node1.txt"));
        assert!(message.contains("denied"));
    }
}
