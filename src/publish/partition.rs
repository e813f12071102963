//! Hour-partitioned object keys.

use chrono::{DateTime, Utc};
use object_store::path::Path;

/// strftime template of the partition prefix.
pub const PARTITION_TEMPLATE: &str = "data/year=%Y/month=%m/day=%d/hour=%H";

/// Base name of the uploaded object inside its partition.
const OBJECT_STEM: &str = "data";

/// Builds object keys from a strftime-style partition template.
///
/// ```ignore
/// let key = PartitionKey::default().key_at(now, "parquet");
/// // data/year=2024/month=03/day=07/hour=05/data.parquet
/// ```
#[derive(Debug, Clone)]
pub struct PartitionKey {
    template: String,
}

impl Default for PartitionKey {
    fn default() -> Self {
        Self::new(PARTITION_TEMPLATE)
    }
}

impl PartitionKey {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_owned(),
        }
    }

    /// Partition prefix for the given instant, in UTC.
    pub fn prefix_at(&self, at: DateTime<Utc>) -> String {
        at.format(&self.template).to_string()
    }

    /// Full object key for a file with extension `ext` at the given instant.
    pub fn key_at(&self, at: DateTime<Utc>, ext: &str) -> Path {
        Path::from(format!("{}/{OBJECT_STEM}.{ext}", self.prefix_at(at)))
    }
}
