//! Mapping from raw API listings to canonical snapshot records.

use crate::model::{RawListing, Record, TimeLeft};

/// Per-unit buyout, rounded half away from zero.
///
/// A zero quantity yields 0 rather than an infinite quotient.
pub fn buyout_each(buyout: i64, quantity: i64) -> i32 {
    if quantity == 0 {
        return 0;
    }
    (buyout as f64 / quantity as f64).round() as i32
}

/// Convert one listing fetched for `(realm_id, auction_house_id)` into a [`Record`].
///
/// Integer fields are narrowed with plain `as` casts.
pub fn transform(listing: &RawListing, realm_id: i32, auction_house_id: i32) -> Record {
    Record {
        realm_id,
        auction_house_id,
        item_id: listing.item_id as i32,
        bid: listing.bid as i32,
        buyout: listing.buyout as i32,
        buyout_each: buyout_each(listing.buyout, listing.quantity),
        quantity: listing.quantity as i32,
        time_left: TimeLeft::from_api(&listing.time_left).code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(buyout: i64, quantity: i64, time_left: &str) -> RawListing {
        RawListing {
            item_id: 2589,
            bid: 90,
            buyout,
            quantity,
            time_left: time_left.to_string(),
        }
    }

    #[test]
    fn test_transform_copies_context_and_fields() {
        let record = transform(&listing(100, 2, "LONG"), 5820, 6);

        assert_eq!(
            record,
            Record {
                realm_id: 5820,
                auction_house_id: 6,
                item_id: 2589,
                bid: 90,
                buyout: 100,
                buyout_each: 50,
                quantity: 2,
                time_left: 3,
            }
        );
    }

    #[test]
    fn test_buyout_each_rounds_half_away_from_zero() {
        assert_eq!(buyout_each(5, 2), 3);
        assert_eq!(buyout_each(7, 2), 4);
        assert_eq!(buyout_each(10, 4), 3);
        assert_eq!(buyout_each(10, 3), 3);
        assert_eq!(buyout_each(11, 3), 4);
        assert_eq!(buyout_each(-5, 2), -3);
    }

    #[test]
    fn test_buyout_each_within_rounding_tolerance() {
        for (buyout, quantity) in [(100, 3), (999_999, 7), (1, 20), (12_345, 200), (0, 5)] {
            let each = buyout_each(buyout, quantity) as i64;
            let diff = (each * quantity - buyout).abs();
            assert!(
                diff * 2 <= quantity,
                "buyout={buyout} quantity={quantity} each={each}"
            );
        }
    }

    #[test]
    fn test_zero_quantity_yields_zero() {
        assert_eq!(buyout_each(100, 0), 0);
        assert_eq!(transform(&listing(100, 0, "SHORT"), 1, 2).buyout_each, 0);
    }

    #[test]
    fn test_time_left_mapping_in_transform() {
        let codes: Vec<i32> = ["SHORT", "MEDIUM", "LONG", "VERY_LONG", "", "NOPE"]
            .iter()
            .map(|t| transform(&listing(10, 1, t), 1, 2).time_left)
            .collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_narrowing_casts_wrap() {
        let mut raw = listing(10, 1, "SHORT");
        raw.bid = i64::from(i32::MAX) + 1;
        let record = transform(&raw, 1, 2);
        assert_eq!(record.bid, i32::MIN);
    }

    #[test]
    fn test_buyout_each_saturates() {
        assert_eq!(buyout_each(i64::MAX, 1), i32::MAX);
        assert_eq!(buyout_each(i64::MIN, 1), i32::MIN);

        let mut raw = listing(0, 1, "LONG");
        raw.buyout = i64::MAX;
        let record = transform(&raw, 1, 2);
        assert_eq!(record.buyout_each, i32::MAX);
        assert_eq!(record.buyout, -1);
    }
}
