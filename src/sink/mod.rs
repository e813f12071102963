//! Snapshot sink: buffers records and finalizes them into one file.

pub mod writer;

use std::path::PathBuf;

use crate::error::WriterError;
use crate::model::Record;

pub use writer::{SnapshotWriter, SnapshotWriterConfig, read_snapshot, snapshot_schema};

/// A finalized, immutable snapshot file on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedFile {
    /// Local path of the file.
    pub path: PathBuf,
    /// Number of records in the file.
    pub record_count: usize,
    /// The size of the file in bytes.
    pub size: u64,
}

impl FinishedFile {
    /// File extension used for the published object name.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or(writer::SNAPSHOT_EXTENSION)
    }
}

/// Append-only destination for transformed records.
///
/// Records must be kept in the order they are appended.
pub trait RecordSink {
    fn append(&mut self, record: Record) -> Result<(), WriterError>;
}

/// In-memory sink.
impl RecordSink for Vec<Record> {
    fn append(&mut self, record: Record) -> Result<(), WriterError> {
        self.push(record);
        Ok(())
    }
}
