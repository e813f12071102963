//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in a run. Events
//! implement the `InternalEvent` trait which records the corresponding metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when listings are received for one realm / auction house pair.
pub struct ListingsFetched {
    pub count: u64,
}

impl InternalEvent for ListingsFetched {
    fn emit(self) {
        trace!(count = self.count, "Listings fetched");
        counter!("auction_snapshot_listings_fetched_total").increment(self.count);
    }
}

/// Event emitted when a batch of records is handed to the Parquet encoder.
pub struct RecordsWritten {
    pub count: u64,
}

impl InternalEvent for RecordsWritten {
    fn emit(self) {
        trace!(count = self.count, "Records written");
        counter!("auction_snapshot_records_written_total").increment(self.count);
    }
}

/// Event emitted for listings with a quantity of zero.
pub struct ZeroQuantityListings {
    pub count: u64,
}

impl InternalEvent for ZeroQuantityListings {
    fn emit(self) {
        trace!(count = self.count, "Zero quantity listings");
        counter!("auction_snapshot_zero_quantity_listings_total").increment(self.count);
    }
}

/// Event emitted when a listing fetch completes.
pub struct FetchDuration {
    pub duration: Duration,
}

impl InternalEvent for FetchDuration {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Fetch completed");
        histogram!("auction_snapshot_fetch_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when the snapshot file is finalized.
pub struct SnapshotFinalized {
    pub records: u64,
    pub bytes: u64,
    pub duration: Duration,
}

impl InternalEvent for SnapshotFinalized {
    fn emit(self) {
        trace!(
            records = self.records,
            bytes = self.bytes,
            duration_ms = self.duration.as_millis(),
            "Snapshot finalized"
        );
        gauge!("auction_snapshot_file_records").set(self.records as f64);
        gauge!("auction_snapshot_file_bytes").set(self.bytes as f64);
        histogram!("auction_snapshot_write_duration_seconds").record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    CreateMultipart,
    PutPart,
    CompleteMultipart,
    AbortMultipart,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::CreateMultipart => "create_multipart",
            StorageOperation::PutPart => "put_part",
            StorageOperation::CompleteMultipart => "complete_multipart",
            StorageOperation::AbortMultipart => "abort_multipart",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "auction_snapshot_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "auction_snapshot_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Run outcome
// ============================================================================

/// Outcome of a pipeline run, labelled by the phase that failed.
#[derive(Debug, Clone, Copy)]
pub enum RunStatus {
    Success,
    Failed { phase: &'static str },
}

/// Event emitted once per run.
pub struct RunCompleted {
    pub status: RunStatus,
    pub duration: Duration,
}

impl InternalEvent for RunCompleted {
    fn emit(self) {
        let (status, phase) = match self.status {
            RunStatus::Success => ("success", "none"),
            RunStatus::Failed { phase } => ("failed", phase),
        };
        trace!(
            status,
            phase,
            duration_ms = self.duration.as_millis(),
            "Run completed"
        );
        counter!(
            "auction_snapshot_pipeline_runs_total",
            "status" => status,
            "phase" => phase
        )
        .increment(1);
        histogram!("auction_snapshot_run_duration_seconds").record(self.duration.as_secs_f64());
    }
}
