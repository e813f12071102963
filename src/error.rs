//! Error types for auction-snapshot using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase. Every pipeline phase has its own
//! variant on [`PipelineError`] so a failed run names where it stopped.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Reference database connection string is empty.
    #[snafu(display("Reference database connection string cannot be empty"))]
    EmptyConnectionString,

    /// API client credentials are missing.
    #[snafu(display("Blizzard API client id and secret must both be set"))]
    MissingCredentials,

    /// Sink path is empty.
    #[snafu(display("Sink path cannot be empty"))]
    EmptySinkPath,

    /// Batch size must be positive.
    #[snafu(display("Sink batch size must be greater than zero"))]
    InvalidBatchSize,

    /// Multipart parts would be smaller than S3 accepts.
    #[snafu(display("Publish part size must be at least 5 MB, got {part_size_mb} MB"))]
    PartSizeTooSmall { part_size_mb: usize },

    /// At least one part must be in flight.
    #[snafu(display("Publish max_concurrent_parts must be greater than zero"))]
    InvalidConcurrency,

    /// Metrics are enabled without an endpoint or a text file to export to.
    #[snafu(display("Metrics are enabled but neither an address nor a textfile is set"))]
    MetricsOutputMissing,

    /// Required environment variable is not set.
    #[snafu(display("Environment variable '{name}' is not set"))]
    MissingEnvVar { name: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Reference Data Errors ============

/// Errors that can occur while loading realms and auction houses.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReferenceError {
    /// Failed to connect to the reference database.
    #[snafu(display("Failed to connect to reference database"))]
    Connect { source: sqlx::Error },

    /// Query against a reference table failed.
    #[snafu(display("Failed to query {table}"))]
    Query {
        table: &'static str,
        source: sqlx::Error,
    },
}

// ============ Fetch Errors ============

/// Errors that can occur while fetching auction listings.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// Failed to build the HTTP client.
    #[snafu(display("Failed to build HTTP client"))]
    ClientBuild { source: reqwest::Error },

    /// Failed to obtain an access token.
    #[snafu(display("Failed to obtain access token"))]
    Token { source: reqwest::Error },

    /// Request to the auction API failed.
    #[snafu(display("Request to {url} failed"))]
    Request { url: String, source: reqwest::Error },

    /// The API answered with a non-success status.
    #[snafu(display("Unexpected status {status} from {url}: {body}"))]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body could not be decoded.
    #[snafu(display("Failed to decode response from {url}"))]
    Decode { url: String, source: reqwest::Error },
}

// ============ Writer Errors ============

/// Errors that can occur while writing the snapshot file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriterError {
    /// Failed to create or open the snapshot file.
    #[snafu(display("Failed to open snapshot file {path}"))]
    FileOpen {
        path: String,
        source: std::io::Error,
    },

    /// Failed to create Parquet writer.
    #[snafu(display("Failed to create Parquet writer"))]
    EncoderCreate {
        source: parquet::errors::ParquetError,
    },

    /// Failed to assemble a record batch from buffered columns.
    #[snafu(display("Failed to build record batch"))]
    BatchBuild { source: arrow::error::ArrowError },

    /// Parquet write error.
    #[snafu(display("Parquet write error"))]
    Write {
        source: parquet::errors::ParquetError,
    },

    /// Failed to read a snapshot file back.
    #[snafu(display("Failed to read snapshot file {path}"))]
    Read {
        path: String,
        source: parquet::errors::ParquetError,
    },

    /// A record batch could not be decoded while reading back.
    #[snafu(display("Failed to decode record batch"))]
    BatchDecode { source: arrow::error::ArrowError },

    /// A column was missing or had an unexpected type.
    #[snafu(display("Snapshot column '{column}' is missing or not Int32"))]
    ColumnType { column: &'static str },

    /// IO error while writing.
    #[snafu(display("IO error on snapshot file"))]
    FileIo { source: std::io::Error },
}

// ============ Publish Errors ============

/// Errors that can occur while publishing the snapshot file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PublishError {
    /// Failed to read the finalized file from local storage.
    #[snafu(display("Failed to read local file {path}"))]
    ReadLocal {
        path: String,
        source: std::io::Error,
    },

    /// Failed to create the destination storage provider.
    #[snafu(display("Failed to create destination storage"))]
    Destination { source: StorageError },

    /// Upload to object storage failed.
    #[snafu(display("Failed to upload {key}"))]
    Transfer { key: String, source: StorageError },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Failed to write the metrics text file.
    #[snafu(display("Failed to write metrics to {path}"))]
    TextfileWrite {
        path: String,
        source: std::io::Error,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors, one variant per phase of a run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Realms or auction houses could not be loaded.
    #[snafu(display("Error occurred while fetching reference data"))]
    ReferenceData { source: ReferenceError },

    /// Listings for one (realm, auction house) pair could not be fetched.
    #[snafu(display(
        "Error occurred while retrieving auctions for realm {realm_id}, auction house {auction_house_id}"
    ))]
    Collect {
        realm_id: i32,
        auction_house_id: i32,
        source: FetchError,
    },

    /// The snapshot writer could not be created.
    #[snafu(display("Error occurred while creating snapshot file"))]
    WriterCreate { source: WriterError },

    /// A record could not be appended to the snapshot.
    #[snafu(display("Error occurred while writing auctions to file"))]
    Append { source: WriterError },

    /// The snapshot could not be flushed.
    #[snafu(display("Error occurred while flushing results to file"))]
    Finalize { source: WriterError },

    /// The snapshot could not be uploaded.
    #[snafu(display("Error occurred while uploading file to object storage"))]
    Upload { source: PublishError },

    /// The auction API client could not be created.
    #[snafu(display("Error occurred while creating auction API client"))]
    ClientSetup { source: FetchError },

    /// The destination storage could not be configured.
    #[snafu(display("Error occurred while configuring destination storage"))]
    PublisherSetup { source: PublishError },

    /// A snapshot file could not be inspected.
    #[snafu(display("Error occurred while reading snapshot file"))]
    Inspect { source: WriterError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}

impl PipelineError {
    /// Short, stable name of the phase that failed, used as a metric label.
    pub fn phase(&self) -> &'static str {
        match self {
            PipelineError::Config { .. } => "config",
            PipelineError::ReferenceData { .. } => "reference_data",
            PipelineError::Collect { .. } => "collect",
            PipelineError::WriterCreate { .. } | PipelineError::Append { .. } => "append",
            PipelineError::Finalize { .. } => "finalize",
            PipelineError::Upload { .. } => "upload",
            PipelineError::ClientSetup { .. }
            | PipelineError::PublisherSetup { .. }
            | PipelineError::Inspect { .. }
            | PipelineError::AddressParse { .. }
            | PipelineError::Metrics { .. } => "setup",
        }
    }
}
