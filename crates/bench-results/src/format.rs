//! Text layout of result records.

use bench_telemetry::DerivedMetrics;

/// Render a millisecond figure, keeping a fractional part on whole values
/// (`12000.0`, `731.5`).
pub fn format_millis(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// The five lines written for one batch, each newline-terminated.
pub fn format_record(metrics: &DerivedMetrics) -> String {
    format!(
        "Batch number = {}\n\
         Batch size = {}\n\
         Time to detect last event of the batch = {}\n\
         Time to sign batch = {}\n\
         Time to Destination call completion = {}\n",
        metrics.batch_number,
        metrics.batch_size,
        format_millis(metrics.event_detect_delay_ms),
        metrics.sign_time_ms,
        metrics.call_completion_delay_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(12000.0), "12000.0");
        assert_eq!(format_millis(0.0), "0.0");
        assert_eq!(format_millis(731.5), "731.5");
        assert_eq!(format_millis(0.25 * 1000.0), "250.0");
    }

    #[test]
    fn test_format_record_layout() {
        let metrics = DerivedMetrics {
            batch_number: 1,
            batch_size: 3,
            event_detect_delay_ms: 12000.0,
            sign_time_ms: 50,
            call_completion_delay_ms: 350,
        };

        assert_eq!(
            format_record(&metrics),
            "Batch number = 1\n\
             Batch size = 3\n\
             Time to detect last event of the batch = 12000.0\n\
             Time to sign batch = 50\n\
             Time to Destination call completion = 350\n"
        );
    }
}
