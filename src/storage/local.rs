//! Local filesystem storage backend.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use snafu::prelude::*;
use std::path::Path;
use std::sync::Arc;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

use super::{Backend, StorageProvider};

impl StorageProvider {
    /// Create a provider rooted at a local directory, creating it if needed.
    pub async fn for_local(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root).await.context(IoSnafu)?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(root).context(ObjectStoreSnafu)?);

        Ok(Self {
            backend: Backend::Local,
            object_store,
            multipart_store: None,
            canonical_url: format!("file://{}", root.display()),
        })
    }
}
