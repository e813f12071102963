//! S3 storage backend.

use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::multipart::MultipartStore;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{S3ConfigSnafu, StorageError};

use super::{Backend, StorageProvider};

/// Uploads are attempted exactly once; a failed run is simply re-triggered.
fn single_attempt() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..Default::default()
    }
}

impl StorageProvider {
    /// Create a provider for an S3 bucket.
    ///
    /// Settings are read from the `AWS_*` environment first, then overridden by
    /// `options` (keys as accepted by [`AmazonS3ConfigKey`], e.g. `region`,
    /// `endpoint`, `access_key_id`).
    pub fn for_s3_bucket(
        bucket: &str,
        options: &HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        for (key, value) in options {
            builder = builder.with_config(key.parse().context(S3ConfigSnafu)?, value.clone());
        }

        let endpoint = builder.get_config_value(&AmazonS3ConfigKey::Endpoint);
        if endpoint.is_some() {
            builder = builder
                .with_virtual_hosted_style_request(false)
                .with_allow_http(true);
        }

        let canonical_url = match (
            endpoint,
            builder.get_config_value(&AmazonS3ConfigKey::Region),
        ) {
            (Some(endpoint), _) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            (None, Some(region)) => format!("https://s3.{region}.amazonaws.com/{bucket}"),
            (None, None) => format!("s3://{bucket}"),
        };

        let s3_store = Arc::new(
            builder
                .with_retry(single_attempt())
                .build()
                .context(S3ConfigSnafu)?,
        );
        let multipart_store: Arc<dyn MultipartStore> = s3_store.clone();
        let object_store: Arc<dyn ObjectStore> = s3_store;

        Ok(Self {
            backend: Backend::S3,
            object_store,
            multipart_store: Some(multipart_store),
            canonical_url,
        })
    }
}
