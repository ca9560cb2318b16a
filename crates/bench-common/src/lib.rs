//! # Bench Common
//!
//! Common types and error definitions shared across the benchmark harness.
//!
//! Every other crate in the workspace builds on these: the error taxonomy
//! used to classify per-node and global failures, and the `NodeIndex`
//! identifying a benchmark participant.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{BenchError, BenchResult};
pub use types::NodeIndex;
