//! Block reader over a node's stdout.

use bench_telemetry::is_terminator;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::trace;

/// Lines kept for a block that has not been terminated yet. Older lines are
/// dropped first; only the tail of a block is ever parsed.
pub const MAX_PENDING_LINES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Non-blank lines of one block, terminator excluded.
    Block(Vec<String>),
    /// The current block contained undecodable output. It has been dropped
    /// and the reader skips to the next terminator.
    Malformed { reason: String },
    /// The stream ended. `partial` holds lines of an unterminated block.
    Eof { partial: Vec<String> },
}

/// Splits a line stream into terminator-delimited blocks.
///
/// `next_block` is cancel safe: bytes and lines read before the future is
/// dropped stay buffered and are returned by the next call.
pub struct BatchStream<R> {
    reader: BufReader<R>,
    line_buf: Vec<u8>,
    pending: VecDeque<String>,
    skipping: bool,
    lines_read: u64,
}

impl<R: AsyncRead + Unpin> BatchStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_buf: Vec::new(),
            pending: VecDeque::new(),
            skipping: false,
            lines_read: 0,
        }
    }

    pub async fn next_block(&mut self) -> std::io::Result<StreamEvent> {
        loop {
            let Some(raw) = self.next_raw_line().await? else {
                return Ok(StreamEvent::Eof {
                    partial: self.pending.drain(..).collect(),
                });
            };
            self.lines_read += 1;

            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) if self.skipping => {
                    trace!(line = self.lines_read, error = %e, "Skipping undecodable line");
                    continue;
                }
                Err(e) => {
                    self.discard_until_terminator();
                    return Ok(StreamEvent::Malformed {
                        reason: format!("line {} is not valid UTF-8: {}", self.lines_read, e.utf8_error()),
                    });
                }
            };

            if is_terminator(&line) {
                if self.skipping {
                    trace!(line = self.lines_read, "Resynchronised on batch terminator");
                    self.skipping = false;
                    self.pending.clear();
                    continue;
                }
                return Ok(StreamEvent::Block(self.pending.drain(..).collect()));
            }

            if self.skipping || line.trim().is_empty() {
                continue;
            }

            if self.pending.len() == MAX_PENDING_LINES {
                self.pending.pop_front();
            }
            self.pending.push_back(line);
        }
    }

    /// Next line without its `\n` / `\r\n` ending, or `None` at end of stream.
    ///
    /// Partially read bytes live in `line_buf`, so a dropped call loses
    /// nothing.
    async fn next_raw_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let read = self.reader.read_until(b'\n', &mut self.line_buf).await?;
        if read == 0 && self.line_buf.is_empty() {
            return Ok(None);
        }

        let mut line = std::mem::take(&mut self.line_buf);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Whether part of a block has been read.
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drops buffered lines and ignores everything up to and including the
    /// next terminator.
    pub fn discard_until_terminator(&mut self) {
        self.pending.clear();
        self.skipping = true;
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}
