//! Node output wire contract.
//!
//! A block is any number of event-detect lines followed by exactly five
//! timing lines, in this order:
//!
//! 1. batch detected at (ms)
//! 2. batch size
//! 3. batch signed at (ms)
//! 4. destination call completed at (ms)
//! 5. destination call delay (ms)
//!
//! and is closed by a line containing `BATCH CALL END`. Labels are free-form;
//! only the numeric tokens are read.

use crate::record::BatchRecord;

/// Literal marker closing every batch block.
pub const BATCH_TERMINATOR: &str = "BATCH CALL END";

/// Number of timing lines preceding the terminator.
pub const TRAILING_FIELD_COUNT: usize = 5;

/// Field names of the trailing lines, in wire order.
pub const TRAILING_FIELDS: [&str; TRAILING_FIELD_COUNT] = [
    "batch detected at",
    "batch size",
    "batch signed at",
    "call completed at",
    "call delay",
];

pub fn is_terminator(line: &str) -> bool {
    line.contains(BATCH_TERMINATOR)
}

/// Render a record the way a node prints it, terminator included.
///
/// `earlier_events` extra event-detect lines are emitted before the one
/// carrying the record's delay; parsers must ignore them.
pub fn render_block(record: &BatchRecord, earlier_events: usize) -> String {
    let mut block = String::new();
    for event in 0..earlier_events {
        block.push_str(&format!(
            "Event detected, delay (s): {}\n",
            record.event_detect_delay_seconds / (earlier_events + 1 - event) as f64
        ));
    }
    block.push_str(&format!(
        "Event detected, delay (s): {}\n",
        record.event_detect_delay_seconds
    ));
    block.push_str(&format!("Batch detected at: {}\n", record.batch_detected_at_ms));
    block.push_str(&format!("Batch size: {}\n", record.batch_size));
    block.push_str(&format!("Batch signed at: {}\n", record.batch_signed_at_ms));
    block.push_str(&format!(
        "Destination call completed at: {}\n",
        record.call_completed_at_ms
    ));
    block.push_str(&format!(
        "Destination call delay (ms): {}\n",
        record.call_delay_ms
    ));
    block.push_str(BATCH_TERMINATOR);
    block.push('\n');
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_ends_with_terminator() {
        let record = BatchRecord {
            batch_number: 1,
            event_detect_delay_seconds: 0.25,
            batch_detected_at_ms: 10,
            batch_size: 2,
            batch_signed_at_ms: 20,
            call_completed_at_ms: 30,
            call_delay_ms: 5,
        };
        let block = render_block(&record, 2);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 3 + TRAILING_FIELD_COUNT + 1);
        assert!(is_terminator(lines.last().unwrap()));
        assert_eq!(lines[2], "Event detected, delay (s): 0.25");
    }

    #[test]
    fn test_terminator_may_follow_other_text() {
        assert!(is_terminator("BATCH CALL END"));
        assert!(is_terminator("[relay] BATCH CALL END"));
        assert!(!is_terminator("BATCH CALL"));
    }
}
