//! Benchmark utilities for generating listings.

use auction_snapshot::model::{RawListing, Record};
use auction_snapshot::transform::transform;

const TIME_LEFT: [&str; 4] = ["SHORT", "MEDIUM", "LONG", "VERY_LONG"];

/// Deterministic listings with a spread of prices, stack sizes and durations.
pub fn generate_listings(count: usize) -> Vec<RawListing> {
    (0..count)
        .map(|i| {
            let quantity = (i % 20) as i64 + 1;
            let buyout = ((i * 7919) % 5_000_000) as i64 * quantity;
            RawListing {
                item_id: 2000 + (i % 15_000) as i64,
                bid: buyout * 4 / 5,
                buyout,
                quantity,
                time_left: TIME_LEFT[i % TIME_LEFT.len()].to_string(),
            }
        })
        .collect()
}

/// Transformed records for `count` listings of one realm / auction house pair.
pub fn generate_records(count: usize) -> Vec<Record> {
    generate_listings(count)
        .iter()
        .map(|listing| transform(listing, 5820, 2))
        .collect()
}
