//! Result log writers

use crate::format::format_record;
use bench_common::{BenchError, BenchResult, NodeIndex};
use bench_telemetry::DerivedMetrics;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Destination for one node's batch metrics.
///
/// A writer belongs to exactly one node worker, which calls `append` once per
/// batch in batch order.
pub trait ResultWriter: Send {
    fn append(&mut self, metrics: &DerivedMetrics) -> BenchResult<()>;
}

/// Appends records to `<results_dir>/node<index>.txt`.
///
/// The file is opened in append mode for every record and closed before
/// `append` returns, so existing content is never truncated and nothing is
/// held open between batches.
#[derive(Debug, Clone)]
pub struct FileResultWriter {
    path: PathBuf,
}

impl FileResultWriter {
    pub fn new(results_dir: impl AsRef<Path>, node: NodeIndex) -> Self {
        Self {
            path: results_dir.as_ref().join(node.log_file_name()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultWriter for FileResultWriter {
    fn append(&mut self, metrics: &DerivedMetrics) -> BenchResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BenchError::io(format!("create results directory {}", parent.display()), &e)
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BenchError::io(format!("open {}", self.path.display()), &e))?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(format_record(metrics).as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| BenchError::io(format!("write {}", self.path.display()), &e))?;

        trace!(
            path = %self.path.display(),
            batch = metrics.batch_number,
            "Appended batch record"
        );

        Ok(())
    }
}

/// Keeps records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultWriter {
    records: Arc<Mutex<Vec<DerivedMetrics>>>,
}

impl MemoryResultWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DerivedMetrics> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ResultWriter for MemoryResultWriter {
    fn append(&mut self, metrics: &DerivedMetrics) -> BenchResult<()> {
        self.records
            .lock()
            .map_err(|_| BenchError::Io {
                context: "memory result buffer".to_string(),
                reason: "lock poisoned".to_string(),
            })?
            .push(metrics.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(batch_number: u64) -> DerivedMetrics {
        DerivedMetrics {
            batch_number,
            batch_size: 3,
            event_detect_delay_ms: 12000.0,
            sign_time_ms: 50,
            call_completion_delay_ms: 350,
        }
    }

    #[test]
    fn test_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let results_dir = dir.path().join("test_results").join("run1");
        let mut writer = FileResultWriter::new(&results_dir, NodeIndex::new(2));

        writer.append(&metrics(1)).unwrap();

        let path = results_dir.join("node2.txt");
        assert_eq!(writer.path(), path.as_path());
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 5);
        assert!(content.starts_with("Batch number = 1\n"));
    }

    #[test]
    fn test_appends_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node1.txt");
        std::fs::write(&path, "Batch number = 0\n").unwrap();

        let mut writer = FileResultWriter::new(dir.path(), NodeIndex::new(1));
        writer.append(&metrics(1)).unwrap();
        writer.append(&metrics(2)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let numbers: Vec<&str> = content
            .lines()
            .filter(|l| l.starts_with("Batch number"))
            .collect();
        assert_eq!(
            numbers,
            vec!["Batch number = 0", "Batch number = 1", "Batch number = 2"]
        );
    }

    #[test]
    fn test_unwritable_location_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let mut writer = FileResultWriter::new(&blocker, NodeIndex::new(1));
        let err = writer.append(&metrics(1)).unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }

    #[test]
    fn test_memory_writer_shares_buffer() {
        let writer = MemoryResultWriter::new();
        let mut handle = writer.clone();
        handle.append(&metrics(1)).unwrap();
        handle.append(&metrics(2)).unwrap();

        let batches: Vec<u64> = writer.records().iter().map(|m| m.batch_number).collect();
        assert_eq!(batches, vec![1, 2]);
    }
}
