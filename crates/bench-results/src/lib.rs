//! # Bench Results
//!
//! Persists derived batch metrics, one append-only text log per node.
//!
//! Each record is five lines:
//!
//! ```text
//! Batch number = 1
//! Batch size = 3
//! Time to detect last event of the batch = 12000.0
//! Time to sign batch = 50
//! Time to Destination call completion = 350
//! ```

pub mod format;
pub mod output;

// Re-export main types
pub use format::{format_millis, format_record};
pub use output::{FileResultWriter, MemoryResultWriter, ResultWriter};
