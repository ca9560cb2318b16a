//! Batch record types.

use bench_common::{BenchError, BenchResult};

/// Timing fields reported by a node for one batch.
///
/// Only produced once every field has been extracted; there is no partial
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    /// 1-based position of the batch in this node's run
    pub batch_number: u64,
    /// Delay until the last event of the batch was detected, in seconds
    pub event_detect_delay_seconds: f64,
    pub batch_detected_at_ms: i64,
    pub batch_size: u64,
    pub batch_signed_at_ms: i64,
    pub call_completed_at_ms: i64,
    /// Destination call delay as reported by the node
    pub call_delay_ms: i64,
}

/// Latency figures written to a node's result log.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    pub batch_number: u64,
    pub batch_size: u64,
    pub event_detect_delay_ms: f64,
    pub sign_time_ms: i64,
    pub call_completion_delay_ms: i64,
}

impl BatchRecord {
    /// Fails with `MalformedBatch` when a figure does not fit its type.
    pub fn derive(&self) -> BenchResult<DerivedMetrics> {
        let event_detect_delay_ms = self.event_detect_delay_seconds * 1000.0;
        if !event_detect_delay_ms.is_finite() {
            return Err(BenchError::malformed(format!(
                "event detect delay of {} s is out of range",
                self.event_detect_delay_seconds
            )));
        }

        let sign_time_ms = self
            .batch_signed_at_ms
            .checked_sub(self.batch_detected_at_ms)
            .ok_or_else(|| {
                BenchError::malformed(format!(
                    "sign time overflows: signed at {} ms, detected at {} ms",
                    self.batch_signed_at_ms, self.batch_detected_at_ms
                ))
            })?;

        Ok(DerivedMetrics {
            batch_number: self.batch_number,
            batch_size: self.batch_size,
            event_detect_delay_ms,
            sign_time_ms,
            call_completion_delay_ms: self.call_delay_ms,
        })
    }
}

impl TryFrom<&BatchRecord> for DerivedMetrics {
    type Error = BenchError;

    fn try_from(record: &BatchRecord) -> BenchResult<Self> {
        record.derive()
    }
}
