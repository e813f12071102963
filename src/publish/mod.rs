//! Publishing finalized snapshot files to object storage.

mod partition;

pub use partition::{PARTITION_TEMPLATE, PartitionKey};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use snafu::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::config::{MB, PublishConfig};
use crate::error::{DestinationSnafu, PublishError, ReadLocalSnafu, TransferSnafu};
use crate::sink::FinishedFile;
use crate::storage::{StorageProvider, StorageProviderRef};

/// Bucket every snapshot is uploaded to.
pub const DESTINATION_BUCKET: &str = "sod-auctions";

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutput {
    /// Full URL of the uploaded object.
    pub location: String,
    /// Object key inside the bucket.
    pub key: String,
    /// Multipart upload id; `None` for single-request uploads.
    pub upload_id: Option<String>,
    pub e_tag: Option<String>,
}

/// Uploads finished files under an hour-partitioned key.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    storage: StorageProviderRef,
    partition: PartitionKey,
    part_size: usize,
    min_multipart_size: usize,
    max_concurrent_parts: usize,
}

impl SnapshotPublisher {
    pub fn new(storage: StorageProviderRef, config: &PublishConfig) -> Self {
        Self {
            storage,
            partition: PartitionKey::default(),
            part_size: config.part_size_mb * MB,
            min_multipart_size: config.min_multipart_size_mb * MB,
            max_concurrent_parts: config.max_concurrent_parts,
        }
    }

    /// Publisher for the destination bucket.
    ///
    /// The bucket lives on S3 unless `local_root` is set, in which case it is a
    /// directory of that name below the root.
    pub async fn for_destination(config: &PublishConfig) -> Result<Self, PublishError> {
        let storage = match &config.local_root {
            Some(root) => StorageProvider::for_local(root.join(DESTINATION_BUCKET)).await,
            None => StorageProvider::for_s3_bucket(DESTINATION_BUCKET, &config.storage_options),
        }
        .context(DestinationSnafu)?;

        info!(destination = storage.canonical_url(), "publishing snapshots");
        Ok(Self::new(Arc::new(storage), config))
    }

    pub fn storage(&self) -> &StorageProvider {
        &self.storage
    }

    /// Upload `file` under the partition of the current hour.
    ///
    /// The key is taken at the moment of upload, not when the run started.
    /// A single attempt is made.
    pub async fn upload(&self, file: &FinishedFile) -> Result<UploadOutput, PublishError> {
        self.upload_at(file, Utc::now()).await
    }

    /// Upload `file` under the partition of `at`.
    pub async fn upload_at(
        &self,
        file: &FinishedFile,
        at: DateTime<Utc>,
    ) -> Result<UploadOutput, PublishError> {
        let key = self.partition.key_at(at, file.extension());

        let contents = tokio::fs::read(&file.path).await.context(ReadLocalSnafu {
            path: file.path.display().to_string(),
        })?;

        info!(
            path = %file.path.display(),
            key = %key,
            bytes = contents.len(),
            "uploading file"
        );

        let (result, upload_id) = self
            .storage
            .put_multipart_bytes(
                &key,
                Bytes::from(contents),
                self.part_size,
                self.min_multipart_size,
                self.max_concurrent_parts,
            )
            .await
            .context(TransferSnafu {
                key: key.to_string(),
            })?;

        Ok(UploadOutput {
            location: self.storage.location(&key),
            key: key.to_string(),
            upload_id,
            e_tag: result.e_tag,
        })
    }
}
