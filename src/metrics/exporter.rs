//! Prometheus export for a single batch run.
//!
//! The process exits once the snapshot is published, so the final state is
//! written to a text file in the exposition format (picked up by the
//! node_exporter textfile collector). While the run lasts, `/metrics` and
//! `/health` can also be served for scraping.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::{MetricsError, PrometheusInitSnafu, TextfileWriteSnafu};

/// Handle to the installed recorder.
#[derive(Clone)]
pub struct MetricsExporter {
    handle: PrometheusHandle,
}

impl MetricsExporter {
    /// Install the Prometheus recorder as the global recorder.
    pub fn install() -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context(PrometheusInitSnafu)?;
        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Current metrics in the Prometheus exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Serve the metrics on `addr` in the background until the process exits.
    pub fn serve(&self, addr: SocketAddr) {
        tokio::spawn(run_server(addr, self.handle.clone()));
    }

    /// Write the current metrics to `path`.
    ///
    /// The file is replaced by rename so a collector never reads a partial write.
    pub async fn write_textfile(&self, path: &Path) -> Result<(), MetricsError> {
        let staging = path.with_extension("prom.tmp");
        let context = || TextfileWriteSnafu {
            path: path.display().to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.context(context())?;
        }
        tokio::fs::write(&staging, self.render())
            .await
            .context(context())?;
        tokio::fs::rename(&staging, path).await.context(context())?;

        debug!(path = %path.display(), "Wrote metrics textfile");
        Ok(())
    }
}

async fn run_server(addr: SocketAddr, handle: PrometheusHandle) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(handle));

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server to {}: {}", addr, e);
            return;
        }
    };
    info!("Serving metrics on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server error: {}", e);
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit;
    use crate::metrics::events::{RunCompleted, RunStatus};
    use std::time::Duration;

    #[tokio::test]
    async fn test_textfile_holds_final_run_outcome() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let exporter = MetricsExporter::from_handle(recorder.handle());

        ::metrics::with_local_recorder(&recorder, || {
            emit!(RunCompleted {
                status: RunStatus::Failed { phase: "upload" },
                duration: Duration::from_millis(250),
            });
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("textfile/auction_snapshot.prom");
        exporter.write_textfile(&path).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let runs = contents
            .lines()
            .find(|line| line.starts_with("auction_snapshot_pipeline_runs_total{"))
            .unwrap();
        assert!(runs.contains("status=\"failed\""));
        assert!(runs.contains("phase=\"upload\""));
        assert!(runs.ends_with(" 1"));
        assert!(!path.with_extension("prom.tmp").exists());
    }
}
