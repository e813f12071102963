//! Parquet snapshot writer.
//!
//! Records are buffered into Arrow column builders and handed to an
//! [`ArrowWriter`] in batches. Nothing is readable until [`SnapshotWriter::finalize`]
//! writes the footer; finalizing consumes the writer, so no record can be
//! appended afterwards.

use arrow::array::{ArrayRef, AsArray, Int32Array, Int32Builder, RecordBatch};
use arrow::datatypes::{DataType, Field, Int32Type, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use snafu::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{FinishedFile, RecordSink};
use crate::config::{ParquetCompression, SinkConfig};
use crate::emit;
use crate::error::{
    BatchBuildSnafu, BatchDecodeSnafu, ColumnTypeSnafu, EncoderCreateSnafu, FileIoSnafu,
    FileOpenSnafu, ReadSnafu, WriteSnafu, WriterError,
};
use crate::metrics::events::{RecordsWritten, SnapshotFinalized};
use crate::model::Record;

/// Extension of snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "parquet";

/// Column order of the snapshot schema.
const COLUMNS: [&str; 8] = [
    "realm_id",
    "auction_house_id",
    "item_id",
    "bid",
    "buyout",
    "buyout_each",
    "quantity",
    "time_left",
];

/// Arrow schema of the snapshot: eight non-nullable Int32 columns.
pub fn snapshot_schema() -> SchemaRef {
    Arc::new(Schema::new(
        COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Int32, false))
            .collect::<Vec<_>>(),
    ))
}

fn to_row(record: &Record) -> [i32; 8] {
    [
        record.realm_id,
        record.auction_house_id,
        record.item_id,
        record.bid,
        record.buyout,
        record.buyout_each,
        record.quantity,
        record.time_left,
    ]
}

fn from_row(row: [i32; 8]) -> Record {
    let [
        realm_id,
        auction_house_id,
        item_id,
        bid,
        buyout,
        buyout_each,
        quantity,
        time_left,
    ] = row;
    Record {
        realm_id,
        auction_house_id,
        item_id,
        bid,
        buyout,
        buyout_each,
        quantity,
        time_left,
    }
}

/// Configuration for the snapshot writer.
#[derive(Debug, Clone)]
pub struct SnapshotWriterConfig {
    /// Records per Arrow batch handed to the Parquet encoder.
    pub batch_size: usize,
    /// Maximum rows per Parquet row group.
    pub max_row_group_size: usize,
    /// Compression codec.
    pub compression: ParquetCompression,
}

impl Default for SnapshotWriterConfig {
    fn default() -> Self {
        Self::from(&SinkConfig::default())
    }
}

impl From<&SinkConfig> for SnapshotWriterConfig {
    fn from(config: &SinkConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_row_group_size: config.max_row_group_size.max(1),
            compression: config.compression,
        }
    }
}

impl SnapshotWriterConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the compression codec.
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    fn writer_properties(&self) -> WriterProperties {
        let compression = match self.compression {
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Lz4 => Compression::LZ4,
        };

        WriterProperties::builder()
            .set_compression(compression)
            .set_max_row_group_size(self.max_row_group_size)
            .build()
    }
}

/// Column builders for records not yet handed to the encoder.
struct ColumnBuffers {
    columns: [Int32Builder; 8],
    len: usize,
}

impl ColumnBuffers {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: std::array::from_fn(|_| Int32Builder::with_capacity(capacity)),
            len: 0,
        }
    }

    fn push(&mut self, record: &Record) {
        for (builder, value) in self.columns.iter_mut().zip(to_row(record)) {
            builder.append_value(value);
        }
        self.len += 1;
    }

    fn take_batch(&mut self, schema: &SchemaRef) -> Result<RecordBatch, WriterError> {
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef)
            .collect();
        self.len = 0;
        RecordBatch::try_new(schema.clone(), arrays).context(BatchBuildSnafu)
    }
}

/// Writes one run's records into a single Parquet file.
pub struct SnapshotWriter {
    path: PathBuf,
    schema: SchemaRef,
    config: SnapshotWriterConfig,
    writer: ArrowWriter<File>,
    buffers: ColumnBuffers,
    records_written: usize,
    batches_written: usize,
    opened_at: Instant,
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SnapshotWriter<{}, {} records>",
            self.path.display(),
            self.records_written + self.buffers.len
        )
    }
}

impl SnapshotWriter {
    /// Create the snapshot file at `path`, replacing any previous file.
    pub fn create(
        path: impl AsRef<Path>,
        config: SnapshotWriterConfig,
    ) -> Result<Self, WriterError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(FileOpenSnafu {
                path: parent.display().to_string(),
            })?;
        }

        let file = File::create(&path).context(FileOpenSnafu {
            path: path.display().to_string(),
        })?;
        let schema = snapshot_schema();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(config.writer_properties()))
            .context(EncoderCreateSnafu)?;

        debug!(
            path = %path.display(),
            batch_size = config.batch_size,
            compression = ?config.compression,
            "Created snapshot writer"
        );

        Ok(Self {
            path,
            schema,
            buffers: ColumnBuffers::with_capacity(config.batch_size),
            config,
            writer,
            records_written: 0,
            batches_written: 0,
            opened_at: Instant::now(),
        })
    }

    /// Buffer one record, flushing a batch to the encoder when full.
    pub fn append(&mut self, record: Record) -> Result<(), WriterError> {
        self.buffers.push(&record);
        if self.buffers.len >= self.config.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    /// Number of records appended so far.
    pub fn record_count(&self) -> usize {
        self.records_written + self.buffers.len
    }

    fn flush_batch(&mut self) -> Result<(), WriterError> {
        if self.buffers.len == 0 {
            return Ok(());
        }
        let batch = self.buffers.take_batch(&self.schema)?;
        self.writer.write(&batch).context(WriteSnafu)?;

        self.records_written += batch.num_rows();
        self.batches_written += 1;
        emit!(RecordsWritten {
            count: batch.num_rows() as u64
        });
        Ok(())
    }

    /// Flush remaining records, write the footer and close the file.
    pub fn finalize(mut self) -> Result<FinishedFile, WriterError> {
        self.flush_batch()?;
        self.writer.close().context(WriteSnafu)?;

        let size = std::fs::metadata(&self.path).context(FileIoSnafu)?.len();

        emit!(SnapshotFinalized {
            records: self.records_written as u64,
            bytes: size,
            duration: self.opened_at.elapsed(),
        });
        info!(
            path = %self.path.display(),
            records = self.records_written,
            batches = self.batches_written,
            bytes = size,
            "Snapshot file finalized"
        );

        Ok(FinishedFile {
            path: self.path,
            record_count: self.records_written,
            size,
        })
    }
}

impl RecordSink for SnapshotWriter {
    fn append(&mut self, record: Record) -> Result<(), WriterError> {
        SnapshotWriter::append(self, record)
    }
}

/// Read every record of a finalized snapshot file, in file order.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Vec<Record>, WriterError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let file = File::open(path).context(FileOpenSnafu {
        path: display.clone(),
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context(ReadSnafu {
            path: display.clone(),
        })?
        .build()
        .context(ReadSnafu { path: display })?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.context(BatchDecodeSnafu)?;
        let columns = COLUMNS
            .iter()
            .map(|name| {
                batch
                    .column_by_name(name)
                    .and_then(|column| column.as_primitive_opt::<Int32Type>())
                    .context(ColumnTypeSnafu { column: *name })
            })
            .collect::<Result<Vec<&Int32Array>, _>>()?;

        records.extend((0..batch.num_rows()).map(|row| {
            from_row(std::array::from_fn(|column| columns[column].value(row)))
        }));
    }

    Ok(records)
}
