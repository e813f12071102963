//! Postgres-backed reference data.

use async_trait::async_trait;
use snafu::prelude::*;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use crate::config::ReferenceConfig;
use crate::error::{ConnectSnafu, QuerySnafu, ReferenceError};
use crate::model::{AuctionHouse, Realm};

use super::ReferenceData;

// The id columns may be SMALLINT; cast so they decode into `i32`.
const REALMS_QUERY: &str = "SELECT id::INT4 AS id, name FROM realms ORDER BY id";
const AUCTION_HOUSES_QUERY: &str = "SELECT id::INT4 AS id, name FROM auction_houses ORDER BY id";

/// Reads realms and auction houses from the `realms` and `auction_houses` tables.
#[derive(Clone)]
pub struct PostgresReferenceData {
    pool: PgPool,
}

impl PostgresReferenceData {
    /// Connect once at startup; the pool is reused for the whole run.
    pub async fn connect(config: &ReferenceConfig) -> Result<Self, ReferenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await
            .context(ConnectSnafu)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ReferenceData for PostgresReferenceData {
    async fn get_realms(&self) -> Result<Vec<Realm>, ReferenceError> {
        let realms = sqlx::query_as::<_, Realm>(REALMS_QUERY)
            .fetch_all(&self.pool)
            .await
            .context(QuerySnafu { table: "realms" })?;
        debug!(count = realms.len(), "Loaded realms");
        Ok(realms)
    }

    async fn get_auction_houses(&self) -> Result<Vec<AuctionHouse>, ReferenceError> {
        let auction_houses = sqlx::query_as::<_, AuctionHouse>(AUCTION_HOUSES_QUERY)
            .fetch_all(&self.pool)
            .await
            .context(QuerySnafu {
                table: "auction_houses",
            })?;
        debug!(count = auction_houses.len(), "Loaded auction houses");
        Ok(auction_houses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_widen_ids_to_int4() {
        for query in [REALMS_QUERY, AUCTION_HOUSES_QUERY] {
            assert!(query.starts_with("SELECT id::INT4 AS id, name FROM "));
            assert!(query.ends_with(" ORDER BY id"));
        }
    }
}
