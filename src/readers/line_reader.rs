use crate::utils::constants::{DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE};
use std::io::{BufRead, BufReader, Stdin};
use tracing::{debug, error};

/// A group of raw lines handed to exactly one partition worker.
pub type LineBatch = Vec<Vec<u8>>;

/// Splits a byte stream into lines and groups them into batches.
///
/// Lines are kept as raw bytes with `\n` or `\r\n` removed; decoding and
/// validation belong to the record parser. A read failure that is not a
/// normal end-of-stream is logged and ends the stream, keeping whatever was
/// read before it.
pub struct LineReader<R: BufRead> {
    reader: R,
    batch_size: usize,
    lines_read: u64,
    input_failed: bool,
    exhausted: bool,
}

impl LineReader<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            std::io::stdin(),
        ))
    }
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            batch_size: DEFAULT_BATCH_SIZE,
            lines_read: 0,
            input_failed: false,
            exhausted: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Read a single line, `None` once the input is exhausted or has failed.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        if self.exhausted {
            return None;
        }

        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                self.exhausted = true;
                debug!(lines_read = self.lines_read, "input exhausted");
                None
            }
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                // Also covers a final CRLF line cut off before its newline.
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                self.lines_read += 1;
                Some(line)
            }
            Err(e) => {
                error!(
                    error = %e,
                    lines_read = self.lines_read,
                    "input stream failed, continuing with lines already read"
                );
                self.input_failed = true;
                self.exhausted = true;
                None
            }
        }
    }

    /// Collect up to `batch_size` lines, `None` when nothing is left.
    pub fn next_batch(&mut self) -> Option<LineBatch> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.next_line() {
                Some(line) => batch.push(line),
                None => break,
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    /// Read everything that is left, for strategies that partition upfront.
    pub fn read_all(&mut self) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        lines
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn input_failed(&self) -> bool {
        self.input_failed
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = LineBatch;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
