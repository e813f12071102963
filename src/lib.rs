//! auction-snapshot: hourly auction-house snapshots as Parquet files.
//!
//! For every (realm, auction house) pair the listings are fetched, mapped to
//! fixed-width records and written to one Parquet file, which is then
//! uploaded under an hour-partitioned key in object storage.
//!
//! # Example
//!
//! ```ignore
//! use auction_snapshot::error::{ConfigSnafu, PipelineError};
//! use auction_snapshot::{Config, run_pipeline};
//! use snafu::ResultExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_env().context(ConfigSnafu)?;
//!     let stats = run_pipeline(config).await?;
//!     println!("Uploaded {} records to {}", stats.collected.records, stats.upload.location);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod sink;
pub mod source;
pub mod storage;
pub mod transform;

// Re-export main types
pub use config::Config;
pub use model::{AuctionHouse, RawListing, Realm, Record, TimeLeft};
pub use pipeline::{Pipeline, SnapshotStats, run_pipeline};
pub use publish::{DESTINATION_BUCKET, SnapshotPublisher, UploadOutput};
pub use sink::{FinishedFile, RecordSink, SnapshotWriter};
pub use storage::{StorageProvider, StorageProviderRef};
