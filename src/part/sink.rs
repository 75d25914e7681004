//! Persistence hooks for tick records.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::engine::TickRecord;
use crate::error::SinkError;

/// Receives every tick record as soon as it is produced.
pub trait RecordSink {
    /// Store one record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the record cannot be stored.
    fn append(&mut self, record: &TickRecord) -> Result<(), SinkError>;

    /// Push buffered records to the backing store.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the backing store fails.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn append(&mut self, record: &TickRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn append(&mut self, _record: &TickRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<TickRecord>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in arrival order.
    #[must_use]
    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    /// Take the records out.
    #[must_use]
    pub fn into_records(self) -> Vec<TickRecord> {
        self.records
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &TickRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: BufWriter<W>,
    written: usize,
}

impl JsonLinesSink<File> {
    /// Create (or truncate) the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    /// Number of records written.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn append(&mut self, record: &TickRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Load records written by [`JsonLinesSink`]. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`SinkError`] if the file cannot be read or a line is not a
/// valid record.
pub fn read_json_lines(path: &Path) -> Result<Vec<TickRecord>, SinkError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlayerTick;

    fn record(tick: u64) -> TickRecord {
        TickRecord {
            sequence: 1,
            group: 3,
            tick,
            model_time: 0.1,
            elapsed_ms: 0,
            group_extraction: 1.0,
            stock_before: 10.0,
            stock_after: 9.56,
            overdraft: false,
            players: vec![PlayerTick {
                player: 1,
                extraction: 1.0,
                benefit: 1.6,
                cost: 1.044,
                payoff: 0.556,
                discounted: 0.0556,
                cumulative: 0.0556,
                substituted: false,
            }],
        }
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.append(&record(0)).unwrap();
        sink.append(&record(1)).unwrap();
        let ticks: Vec<_> = sink.records().iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![0, 1]);
    }

    #[test]
    fn test_json_lines_one_object_per_line() {
        let mut buffer = Vec::new();
        {
            let mut sink = JsonLinesSink::new(&mut buffer);
            sink.append(&record(0)).unwrap();
            sink.append(&record(1)).unwrap();
            assert_eq!(sink.written(), 2);
            sink.flush().unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 2);
        let back: TickRecord = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(back, record(0));
    }

    #[test]
    fn test_sink_through_mut_reference() {
        fn store(mut sink: impl RecordSink) {
            sink.append(&record(5)).unwrap();
        }
        let mut sink = MemorySink::new();
        store(&mut sink);
        assert_eq!(sink.records().len(), 1);
    }
}
