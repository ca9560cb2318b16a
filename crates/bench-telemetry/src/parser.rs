//! Batch block parser.

use crate::numeric::{first_i64, first_u64, last_f64};
use crate::record::BatchRecord;
use crate::wire::{BATCH_TERMINATOR, TRAILING_FIELDS, TRAILING_FIELD_COUNT};
use bench_common::{BenchError, BenchResult};

/// Parse the lines of one block (terminator excluded) into a record.
///
/// Blank lines are skipped. The last five remaining lines are the timing
/// fields; the line just before them is the last event-detect line and
/// supplies the delay. Any earlier lines are ignored.
pub fn parse_batch<S: AsRef<str>>(lines: &[S], batch_number: u64) -> BenchResult<BatchRecord> {
    let lines: Vec<&str> = lines
        .iter()
        .map(|l| l.as_ref().trim())
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < TRAILING_FIELD_COUNT {
        return Err(BenchError::malformed(format!(
            "expected {} timing lines before terminator, found {}",
            TRAILING_FIELD_COUNT,
            lines.len()
        )));
    }

    let split = lines.len() - TRAILING_FIELD_COUNT;
    let (events, trailing) = lines.split_at(split);
    let event_line = events
        .last()
        .ok_or_else(|| BenchError::malformed("block has no event-detect line"))?;

    let event_detect_delay_seconds = last_f64(event_line, "event detect delay")?;
    if !event_detect_delay_seconds.is_finite() || event_detect_delay_seconds < 0.0 {
        return Err(BenchError::malformed(format!(
            "event detect delay must be a non-negative number, got {}",
            event_detect_delay_seconds
        )));
    }

    let record = BatchRecord {
        batch_number,
        event_detect_delay_seconds,
        batch_detected_at_ms: first_i64(trailing[0], TRAILING_FIELDS[0])?,
        batch_size: first_u64(trailing[1], TRAILING_FIELDS[1])?,
        batch_signed_at_ms: first_i64(trailing[2], TRAILING_FIELDS[2])?,
        call_completed_at_ms: first_i64(trailing[3], TRAILING_FIELDS[3])?,
        call_delay_ms: first_i64(trailing[4], TRAILING_FIELDS[4])?,
    };

    // derived figures must be representable too
    record.derive()?;
    Ok(record)
}

/// Parse raw text holding one block and its terminator.
///
/// Text after the terminator is ignored, as is any text sharing the
/// terminator's line.
pub fn parse_block(text: &str, batch_number: u64) -> BenchResult<BatchRecord> {
    let end = text.find(BATCH_TERMINATOR).ok_or_else(|| {
        BenchError::malformed(format!("terminator {:?} not found", BATCH_TERMINATOR))
    })?;

    let body = &text[..end];
    let body = match body.rfind('\n') {
        Some(last_newline) => &body[..last_newline],
        None => "",
    };

    let lines: Vec<&str> = body.lines().collect();
    parse_batch(&lines, batch_number)
}
