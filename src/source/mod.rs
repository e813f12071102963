//! Sources feeding the snapshot: reference data and auction listings.
//!
//! The pipeline only talks to the [`ReferenceData`] and [`AuctionSource`]
//! traits. The shipped adapters are a Postgres-backed reference store and
//! the Blizzard game data API client.

pub mod blizzard;
pub mod database;
pub mod enumerate;

use async_trait::async_trait;

use crate::error::{FetchError, ReferenceError};
use crate::model::{AuctionHouse, RawListing, Realm};

pub use blizzard::BlizzardClient;
pub use database::PostgresReferenceData;
pub use enumerate::{enumerate, work_set_size};

/// Lookup of the realms and auction houses to capture.
///
/// Both lists are loaded once per run; their order drives the snapshot order.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    /// All realms, in the order they should be collected.
    async fn get_realms(&self) -> Result<Vec<Realm>, ReferenceError>;

    /// All auction houses, in the order they should be collected.
    async fn get_auction_houses(&self) -> Result<Vec<AuctionHouse>, ReferenceError>;
}

/// Remote listing fetch for one (realm, auction house) pair.
#[async_trait]
pub trait AuctionSource: Send + Sync {
    async fn get_auctions(
        &self,
        realm_id: i32,
        auction_house_id: i32,
    ) -> Result<Vec<RawListing>, FetchError>;
}
