//! One collection run: reference data, collection, finalize, upload.
//!
//! Phases run strictly in order and the first failure ends the run. A
//! snapshot is only uploaded after every pair was collected and the file
//! was finalized, so a failed run never publishes a partial snapshot.

mod collector;

pub use collector::{CollectStats, Collector};

use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::{Config, SinkConfig};
use crate::emit;
use crate::error::{
    ClientSetupSnafu, FinalizeSnafu, PipelineError, PublisherSetupSnafu, ReferenceDataSnafu,
    UploadSnafu, WriterCreateSnafu,
};
use crate::metrics::events::{RunCompleted, RunStatus};
use crate::publish::{SnapshotPublisher, UploadOutput};
use crate::sink::{SnapshotWriter, SnapshotWriterConfig};
use crate::source::{AuctionSource, BlizzardClient, PostgresReferenceData, ReferenceData};

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct SnapshotStats {
    pub realms: usize,
    pub auction_houses: usize,
    pub collected: CollectStats,
    /// Size of the uploaded file in bytes.
    pub bytes: u64,
    pub upload: UploadOutput,
}

/// The collection-transform-export pipeline.
pub struct Pipeline {
    reference: Arc<dyn ReferenceData>,
    source: Arc<dyn AuctionSource>,
    publisher: SnapshotPublisher,
    sink: SinkConfig,
}

impl Pipeline {
    pub fn new(
        reference: Arc<dyn ReferenceData>,
        source: Arc<dyn AuctionSource>,
        publisher: SnapshotPublisher,
        sink: SinkConfig,
    ) -> Self {
        Self {
            reference,
            source,
            publisher,
            sink,
        }
    }

    /// Run the pipeline once and record the outcome.
    pub async fn run(&self) -> Result<SnapshotStats, PipelineError> {
        let start = Instant::now();
        let result = self.execute().await;

        let status = match &result {
            Ok(_) => RunStatus::Success,
            Err(e) => RunStatus::Failed { phase: e.phase() },
        };
        emit!(RunCompleted {
            status,
            duration: start.elapsed(),
        });

        result
    }

    async fn execute(&self) -> Result<SnapshotStats, PipelineError> {
        info!("fetching realms");
        let realms = self
            .reference
            .get_realms()
            .await
            .context(ReferenceDataSnafu)?;

        info!("fetching auction houses");
        let auction_houses = self
            .reference
            .get_auction_houses()
            .await
            .context(ReferenceDataSnafu)?;

        info!(
            realms = realms.len(),
            auction_houses = auction_houses.len(),
            path = %self.sink.path.display(),
            "creating snapshot file"
        );
        let mut writer =
            SnapshotWriter::create(&self.sink.path, SnapshotWriterConfig::from(&self.sink))
                .context(WriterCreateSnafu)?;

        let collected = Collector::new(self.source.as_ref())
            .collect(&realms, &auction_houses, &mut writer)
            .await?;

        info!("flushing results to file");
        let file = writer.finalize().context(FinalizeSnafu)?;

        info!("uploading file to object storage");
        let upload = self.publisher.upload(&file).await.context(UploadSnafu)?;

        info!(
            records = file.record_count,
            bytes = file.size,
            e_tag = upload.e_tag.as_deref().unwrap_or("-"),
            "successfully uploaded file {} ({})",
            upload.location,
            upload.upload_id.as_deref().unwrap_or("single request")
        );

        Ok(SnapshotStats {
            realms: realms.len(),
            auction_houses: auction_houses.len(),
            collected,
            bytes: file.size,
            upload,
        })
    }
}

/// Build the production collaborators from `config` and run once.
pub async fn run_pipeline(config: Config) -> Result<SnapshotStats, PipelineError> {
    let source = BlizzardClient::new(&config.blizzard).context(ClientSetupSnafu)?;
    let publisher = SnapshotPublisher::for_destination(&config.publish)
        .await
        .context(PublisherSetupSnafu)?;
    let reference = PostgresReferenceData::connect(&config.reference)
        .await
        .context(ReferenceDataSnafu)?;

    Pipeline::new(
        Arc::new(reference),
        Arc::new(source),
        publisher,
        config.sink,
    )
    .run()
    .await
}
