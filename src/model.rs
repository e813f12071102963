//! Domain types shared across the pipeline.
//!
//! Realms and auction houses come from the reference-data collaborator,
//! raw listings from the auction API, and [`Record`] is the canonical row
//! written to the snapshot file.

use serde::{Deserialize, Serialize};

/// A game realm (connected realm on the API side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Realm {
    pub id: i32,
    pub name: String,
}

/// A faction-scoped auction house within a realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuctionHouse {
    pub id: i32,
    pub name: String,
}

/// One listing as reported by the auction API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawListing {
    pub item_id: i64,
    pub bid: i64,
    pub buyout: i64,
    pub quantity: i64,
    pub time_left: String,
}

/// Coarse remaining-duration bucket of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeLeft {
    Unknown,
    Short,
    Medium,
    Long,
    VeryLong,
}

impl TimeLeft {
    /// Parse the API string. Anything unrecognized is [`TimeLeft::Unknown`].
    pub fn from_api(value: &str) -> Self {
        match value {
            "SHORT" => TimeLeft::Short,
            "MEDIUM" => TimeLeft::Medium,
            "LONG" => TimeLeft::Long,
            "VERY_LONG" => TimeLeft::VeryLong,
            _ => TimeLeft::Unknown,
        }
    }

    /// Numeric code stored in the snapshot.
    pub fn code(self) -> i32 {
        match self {
            TimeLeft::Unknown => 0,
            TimeLeft::Short => 1,
            TimeLeft::Medium => 2,
            TimeLeft::Long => 3,
            TimeLeft::VeryLong => 4,
        }
    }
}

/// Canonical exported row. Identity is positional; duplicates are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Record {
    pub realm_id: i32,
    pub auction_house_id: i32,
    pub item_id: i32,
    pub bid: i32,
    pub buyout: i32,
    pub buyout_each: i32,
    pub quantity: i32,
    pub time_left: i32,
}

/// One unit of collection work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem<'a> {
    pub realm: &'a Realm,
    pub auction_house: &'a AuctionHouse,
}
