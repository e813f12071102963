//! Object storage abstraction.
//!
//! Wraps an [`ObjectStore`] (S3 in production, the local filesystem or an
//! injected store otherwise) and reports every request as a metric.

mod local;
mod s3;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, MultipartId, ObjectStore, PutOptions, PutPayload,
    PutResult,
};
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

/// Content type of uploaded snapshot files.
pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
    Injected,
}

/// Storage provider for the snapshot destination.
#[derive(Clone)]
pub struct StorageProvider {
    backend: Backend,
    object_store: Arc<dyn ObjectStore>,
    /// Only set for backends with explicit part numbering (S3).
    multipart_store: Option<Arc<dyn MultipartStore>>,
    canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

fn observe(operation: StorageOperation, ok: bool, start: Instant) {
    emit!(StorageRequest {
        operation,
        status: if ok {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        },
    });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

impl StorageProvider {
    /// Wrap an existing object store. Paths are used as given.
    pub fn with_store(object_store: Arc<dyn ObjectStore>, canonical_url: impl Into<String>) -> Self {
        Self {
            backend: Backend::Injected,
            object_store,
            multipart_store: None,
            canonical_url: canonical_url.into(),
        }
    }

    /// Enable multipart uploads through `multipart_store`.
    pub fn with_multipart(mut self, multipart_store: Arc<dyn MultipartStore>) -> Self {
        self.multipart_store = Some(multipart_store);
        self
    }

    /// Base URL of the destination, e.g. `s3://sod-auctions`.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Full URL of an object in this store.
    pub fn location(&self, path: &Path) -> String {
        format!("{}/{}", self.canonical_url.trim_end_matches('/'), path)
    }

    /// Get the contents of an object.
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        let start = Instant::now();
        let result = self.object_store.get(path).await;
        observe(StorageOperation::Get, result.is_ok(), start);

        result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)
    }

    /// Put a Parquet object with a single request.
    ///
    /// The content type is set on S3; the local filesystem does not store attributes.
    pub async fn put_parquet(
        &self,
        path: &Path,
        payload: PutPayload,
    ) -> Result<PutResult, StorageError> {
        let opts = match self.backend {
            Backend::S3 => PutOptions {
                attributes: Attributes::from_iter([(
                    Attribute::ContentType,
                    AttributeValue::from(PARQUET_CONTENT_TYPE),
                )]),
                ..Default::default()
            },
            Backend::Local | Backend::Injected => PutOptions::default(),
        };

        let start = Instant::now();
        let result = self.object_store.put_opts(path, payload, opts).await;
        observe(StorageOperation::Put, result.is_ok(), start);

        result.context(ObjectStoreSnafu)
    }

    /// Upload bytes, splitting them into parts uploaded in parallel when the
    /// payload reaches `min_multipart_size` and the backend supports it.
    ///
    /// Returns the put result and, for multipart uploads, the upload id.
    pub async fn put_multipart_bytes(
        &self,
        path: &Path,
        bytes: Bytes,
        part_size: usize,
        min_multipart_size: usize,
        max_concurrent_parts: usize,
    ) -> Result<(PutResult, Option<String>), StorageError> {
        let multipart_store = match &self.multipart_store {
            Some(store) if bytes.len() >= min_multipart_size => store.clone(),
            _ => {
                let result = self.put_parquet(path, PutPayload::from(bytes)).await?;
                return Ok((result, None));
            }
        };

        let start = Instant::now();
        let created = multipart_store.create_multipart(path).await;
        observe(StorageOperation::CreateMultipart, created.is_ok(), start);
        let upload_id = created.context(ObjectStoreSnafu)?;

        match upload_parts(
            multipart_store.as_ref(),
            path,
            &upload_id,
            bytes,
            part_size,
            max_concurrent_parts,
        )
        .await
        {
            Ok(result) => Ok((result, Some(upload_id))),
            Err(e) => {
                // A failed upload must not leave parts behind.
                let start = Instant::now();
                let aborted = multipart_store.abort_multipart(path, &upload_id).await;
                observe(StorageOperation::AbortMultipart, aborted.is_ok(), start);
                if let Err(abort_err) = aborted {
                    warn!(
                        path = %path,
                        upload_id = %upload_id,
                        error = %abort_err,
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Upload all parts of `bytes` and complete the upload.
async fn upload_parts(
    multipart_store: &dyn MultipartStore,
    path: &Path,
    upload_id: &MultipartId,
    bytes: Bytes,
    part_size: usize,
    max_concurrent_parts: usize,
) -> Result<PutResult, StorageError> {
    let part_size = part_size.max(1);
    let parts: Vec<(usize, Bytes)> = (0..bytes.len())
        .step_by(part_size)
        .enumerate()
        .map(|(idx, offset)| (idx, bytes.slice(offset..(offset + part_size).min(bytes.len()))))
        .collect();
    let total_parts = parts.len();

    debug!(
        path = %path,
        bytes = bytes.len(),
        parts = total_parts,
        concurrency = max_concurrent_parts,
        "Starting multipart upload"
    );

    let mut uploaded: Vec<(usize, PartId)> = futures::stream::iter(parts)
        .map(|(idx, data)| async move {
            let start = Instant::now();
            let result = multipart_store
                .put_part(path, upload_id, idx, data.into())
                .await;
            observe(StorageOperation::PutPart, result.is_ok(), start);

            let part_id = result.context(ObjectStoreSnafu)?;
            debug!("Uploaded part {}/{}", idx + 1, total_parts);
            Ok::<_, StorageError>((idx, part_id))
        })
        .buffer_unordered(max_concurrent_parts.max(1))
        .try_collect()
        .await?;

    // Parts may complete out of order.
    uploaded.sort_by_key(|(idx, _)| *idx);
    let part_ids = uploaded.into_iter().map(|(_, id)| id).collect();

    let start = Instant::now();
    let completed = multipart_store
        .complete_multipart(path, upload_id, part_ids)
        .await;
    observe(StorageOperation::CompleteMultipart, completed.is_ok(), start);

    completed.context(ObjectStoreSnafu)
}
