//! # Bench Telemetry
//!
//! Turns the timing output of a node process into batch records.
//!
//! A node writes line-oriented text in blocks, each closed by the literal
//! line `BATCH CALL END`. The last five lines before the terminator carry
//! the batch timestamps, the line before them the detection delay of the
//! batch's last event. This crate provides:
//! - The numeric token primitive used to pull values out of labelled lines
//! - `BatchRecord` / `DerivedMetrics`
//! - The block parser and a renderer for synthetic blocks

pub mod numeric;
pub mod parser;
pub mod record;
pub mod wire;

// Re-export main types
pub use parser::{parse_batch, parse_block};
pub use record::{BatchRecord, DerivedMetrics};
pub use wire::{is_terminator, render_block, BATCH_TERMINATOR, TRAILING_FIELD_COUNT};
