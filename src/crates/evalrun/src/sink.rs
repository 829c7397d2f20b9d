//! Order-preserving sink
//!
//! Completions arrive in any order. The sink parks them in a reorder buffer
//! and writes the contiguous prefix starting at `next_to_write` as soon as it
//! exists, so the output is always a gap-free prefix of the submission order.

use crate::error::{EvalError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for flushed records.
pub trait RecordWriter<R> {
    /// Persist one whole record.
    fn write_record(&mut self, record: &R) -> Result<()>;
}

/// Collects records in memory.
impl<R: Clone> RecordWriter<R> for Vec<R> {
    fn write_record(&mut self, record: &R) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Appends records to a JSON Lines file.
///
/// Every record is serialized to a complete line first and handed to the OS
/// in a single append, so a reader tailing the file never sees half a record.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    file: File,
}

impl JsonlWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Serialize> RecordWriter<R> for JsonlWriter {
    fn write_record(&mut self, record: &R) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Outcome of one [`OrderedSink::offer`].
///
/// `records` were written, in index order, even when `error` is set: a
/// writer failure stops the flush at the failing record and leaves it
/// pending.
#[derive(Debug)]
pub struct Flush<R> {
    pub records: Vec<R>,
    pub error: Option<EvalError>,
}

impl<R> Flush<R> {
    /// Written records, or the writer error if there was one.
    pub fn into_result(self) -> Result<Vec<R>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.records),
        }
    }
}

/// Reorder buffer in front of a [`RecordWriter`].
#[derive(Debug)]
pub struct OrderedSink<R, W> {
    writer: W,
    next_to_write: usize,
    pending: BTreeMap<usize, R>,
}

impl<R, W: RecordWriter<R>> OrderedSink<R, W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_to_write: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accept the record for `index` and flush whatever became contiguous.
    ///
    /// An index that is already pending or already written is rejected with
    /// [`EvalError::DuplicateIndex`] and nothing is flushed. Writer failures
    /// are reported inside the returned [`Flush`] together with the records
    /// that did reach the writer.
    pub fn offer(&mut self, index: usize, record: R) -> Result<Flush<R>> {
        if index < self.next_to_write || self.pending.contains_key(&index) {
            return Err(EvalError::DuplicateIndex(index));
        }
        self.pending.insert(index, record);

        let mut records = Vec::new();
        while let Some(record) = self.pending.remove(&self.next_to_write) {
            if let Err(e) = self.writer.write_record(&record) {
                self.pending.insert(self.next_to_write, record);
                return Ok(Flush {
                    records,
                    error: Some(e),
                });
            }
            records.push(record);
            self.next_to_write += 1;
        }
        Ok(Flush {
            records,
            error: None,
        })
    }

    /// Smallest index not yet written; also the number of records written.
    pub fn next_to_write(&self) -> usize {
        self.next_to_write
    }

    /// Records waiting for a lower index.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.keys().copied()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}
