//! Configuration loading.
//!
//! Configuration comes either from a YAML file (with environment variable
//! interpolation) or, for trigger-style invocations, straight from the
//! credential environment variables.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{
    ConfigError, EmptyConnectionStringSnafu, EmptySinkPathSnafu, EnvInterpolationSnafu,
    InvalidBatchSizeSnafu, InvalidConcurrencySnafu, MetricsOutputMissingSnafu,
    MissingCredentialsSnafu, MissingEnvVarSnafu, PartSizeTooSmallSnafu, ReadFileSnafu,
    YamlParseSnafu,
};

pub use vars::{InterpolationResult, interpolate, interpolate_with};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

pub const DB_CONNECTION_STRING_VAR: &str = "DB_CONNECTION_STRING";
pub const CLIENT_ID_VAR: &str = "BLIZZARD_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "BLIZZARD_CLIENT_SECRET";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub blizzard: BlizzardConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Reference-data database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Postgres connection string.
    pub connection_string: String,
    /// Pool size (default: 2).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    2
}

/// Auction API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlizzardConfig {
    pub client_id: String,
    pub client_secret: String,
    /// API region (default: "us").
    #[serde(default = "default_region")]
    pub region: String,
    /// Game data namespace; defaults to the classic era namespace of the region.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Response locale (default: "en_US").
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Override of the OAuth token endpoint.
    #[serde(default)]
    pub oauth_url: Option<String>,
    /// Override of the API base URL.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Per-request timeout in seconds (default: 60).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_region() -> String {
    "us".to_string()
}

fn default_locale() -> String {
    "en_US".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl BlizzardConfig {
    pub fn namespace(&self) -> String {
        self.namespace
            .clone()
            .unwrap_or_else(|| format!("dynamic-classic1x-{}", self.region))
    }

    pub fn oauth_url(&self) -> String {
        self.oauth_url
            .clone()
            .unwrap_or_else(|| "https://oauth.battle.net/token".to_string())
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.api.blizzard.com", self.region))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Local snapshot file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Local path of the snapshot file (default: /tmp/data.parquet).
    #[serde(default = "default_sink_path")]
    pub path: PathBuf,

    /// Records buffered per Arrow batch (default: 8192).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum rows per Parquet row group (default: 1M).
    #[serde(default = "default_max_row_group_size")]
    pub max_row_group_size: usize,

    /// Parquet compression codec.
    #[serde(default)]
    pub compression: ParquetCompression,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: default_sink_path(),
            batch_size: default_batch_size(),
            max_row_group_size: default_max_row_group_size(),
            compression: ParquetCompression::default(),
        }
    }
}

fn default_sink_path() -> PathBuf {
    PathBuf::from("/tmp/data.parquet")
}

fn default_batch_size() -> usize {
    8192
}

fn default_max_row_group_size() -> usize {
    1024 * 1024
}

/// Smallest part size accepted by S3 for all but the last part.
pub const MIN_PART_SIZE_MB: usize = 5;

/// Upload settings. The destination bucket itself is fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Object store options (region, endpoint, credentials, ...).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,

    /// Publish into this local directory instead of S3, for development runs.
    /// Objects land under `<local_root>/sod-auctions/`.
    #[serde(default)]
    pub local_root: Option<PathBuf>,

    /// Target size per multipart part in MB (default: 16)
    #[serde(default = "default_part_size_mb")]
    pub part_size_mb: usize,

    /// Minimum file size in MB before using multipart upload (default: 32)
    /// Files smaller than this use single PUT
    #[serde(default = "default_min_multipart_size_mb")]
    pub min_multipart_size_mb: usize,

    /// Maximum concurrent parts per multipart upload (default: 4)
    #[serde(default = "default_max_concurrent_parts")]
    pub max_concurrent_parts: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            storage_options: HashMap::new(),
            local_root: None,
            part_size_mb: default_part_size_mb(),
            min_multipart_size_mb: default_min_multipart_size_mb(),
            max_concurrent_parts: default_max_concurrent_parts(),
        }
    }
}

fn default_part_size_mb() -> usize {
    16
}

fn default_min_multipart_size_mb() -> usize {
    32
}

fn default_max_concurrent_parts() -> usize {
    4
}

/// Metrics export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Record metrics during the run (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Serve `/metrics` and `/health` on this address while the run lasts.
    #[serde(default)]
    pub address: Option<String>,
    /// Write the final metrics in the Prometheus text format to this file
    /// when the run ends (node_exporter textfile collector).
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        Self::from_yaml(&content, interpolate_env)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str, interpolate_env: bool) -> Result<Self, ConfigError> {
        let content = if interpolate_env {
            let result = vars::interpolate(content);
            if !result.is_ok() {
                return EnvInterpolationSnafu {
                    message: result.errors.join("\n"),
                }
                .fail();
            }
            result.text
        } else {
            content.to_string()
        };

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the credential environment variables alone.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup, using defaults for everything else.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name).context(MissingEnvVarSnafu {
                name: name.to_string(),
            })
        };

        let config = Config {
            reference: ReferenceConfig {
                connection_string: required(DB_CONNECTION_STRING_VAR)?,
                max_connections: default_max_connections(),
            },
            blizzard: BlizzardConfig {
                client_id: required(CLIENT_ID_VAR)?,
                client_secret: required(CLIENT_SECRET_VAR)?,
                region: default_region(),
                namespace: None,
                locale: default_locale(),
                oauth_url: None,
                api_url: None,
                request_timeout_secs: default_request_timeout_secs(),
            },
            sink: SinkConfig::default(),
            publish: PublishConfig::default(),
            metrics: MetricsConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.reference.connection_string.is_empty(),
            EmptyConnectionStringSnafu
        );
        ensure!(
            !self.blizzard.client_id.is_empty() && !self.blizzard.client_secret.is_empty(),
            MissingCredentialsSnafu
        );
        ensure!(!self.sink.path.as_os_str().is_empty(), EmptySinkPathSnafu);
        ensure!(self.sink.batch_size > 0, InvalidBatchSizeSnafu);
        ensure!(
            self.publish.part_size_mb >= MIN_PART_SIZE_MB,
            PartSizeTooSmallSnafu {
                part_size_mb: self.publish.part_size_mb,
            }
        );
        ensure!(self.publish.max_concurrent_parts > 0, InvalidConcurrencySnafu);
        ensure!(
            !self.metrics.enabled
                || self.metrics.address.is_some()
                || self.metrics.textfile.is_some(),
            MetricsOutputMissingSnafu
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
reference:
  connection_string: "postgres://localhost/auctions"
blizzard:
  client_id: "id"
  client_secret: "secret"
"#;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = Config::from_yaml(MINIMAL, false).unwrap();

        assert_eq!(config.reference.max_connections, 2);
        assert_eq!(config.blizzard.region, "us");
        assert_eq!(config.blizzard.namespace(), "dynamic-classic1x-us");
        assert_eq!(config.blizzard.api_url(), "https://us.api.blizzard.com");
        assert_eq!(config.sink.path, PathBuf::from("/tmp/data.parquet"));
        assert_eq!(config.sink.batch_size, 8192);
        assert_eq!(config.sink.compression, ParquetCompression::Snappy);
        assert_eq!(config.publish.min_multipart_size_mb, 32);
        assert!(config.publish.local_root.is_none());
        assert!(!config.metrics.enabled);
        assert!(config.metrics.address.is_none());
        assert!(config.metrics.textfile.is_none());
    }

    #[test]
    fn test_validation_rejects_empty_credentials() {
        let yaml = MINIMAL.replace("\"secret\"", "\"\"");
        let err = Config::from_yaml(&yaml, false).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials));
    }

    #[test]
    fn test_validation_rejects_zero_batch_size() {
        let yaml = format!("{MINIMAL}sink:\n  batch_size: 0\n");
        let err = Config::from_yaml(&yaml, false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchSize));
    }

    #[test]
    fn test_validation_rejects_small_parts() {
        let yaml = format!("{MINIMAL}publish:\n  part_size_mb: 0\n");
        let err = Config::from_yaml(&yaml, false).unwrap_err();
        assert!(matches!(err, ConfigError::PartSizeTooSmall { part_size_mb: 0 }));

        let yaml = format!("{MINIMAL}publish:\n  part_size_mb: 5\n");
        assert!(Config::from_yaml(&yaml, false).is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let yaml = format!("{MINIMAL}publish:\n  max_concurrent_parts: 0\n");
        let err = Config::from_yaml(&yaml, false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConcurrency));
    }

    #[test]
    fn test_enabled_metrics_need_an_output() {
        let yaml = format!("{MINIMAL}metrics:\n  enabled: true\n");
        let err = Config::from_yaml(&yaml, false).unwrap_err();
        assert!(matches!(err, ConfigError::MetricsOutputMissing));

        let yaml = format!("{MINIMAL}metrics:\n  enabled: true\n  textfile: /tmp/run.prom\n");
        let config = Config::from_yaml(&yaml, false).unwrap();
        assert_eq!(config.metrics.textfile, Some(PathBuf::from("/tmp/run.prom")));
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(|name| match name {
            DB_CONNECTION_STRING_VAR => Some("postgres://db/auctions".to_string()),
            CLIENT_ID_VAR => Some("client".to_string()),
            CLIENT_SECRET_VAR => Some("secret".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.reference.connection_string, "postgres://db/auctions");
        assert_eq!(config.blizzard.client_id, "client");
        assert_eq!(config.sink.path, PathBuf::from("/tmp/data.parquet"));
    }

    #[test]
    fn test_from_lookup_missing_variable() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        match err {
            ConfigError::MissingEnvVar { name } => assert_eq!(name, DB_CONNECTION_STRING_VAR),
            other => panic!("unexpected error: {other}"),
        }
    }
}
