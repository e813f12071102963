//! Sequential collection of listings into a record sink.

use snafu::prelude::*;
use std::time::Instant;
use tracing::{info, warn};

use crate::emit;
use crate::error::{AppendSnafu, CollectSnafu, PipelineError};
use crate::metrics::events::{FetchDuration, ListingsFetched, ZeroQuantityListings};
use crate::model::{AuctionHouse, Realm};
use crate::sink::RecordSink;
use crate::source::{AuctionSource, enumerate, work_set_size};
use crate::transform::transform;

/// Counts gathered while collecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Realm / auction house pairs fetched.
    pub pairs: usize,
    /// Records appended to the sink.
    pub records: usize,
    /// Listings with a quantity of zero (exported with `buyout_each = 0`).
    pub zero_quantity: usize,
}

/// Fetches every (realm, auction house) pair in turn and appends the
/// transformed listings to a sink.
///
/// The first failed fetch or append stops collection.
pub struct Collector<'a> {
    source: &'a dyn AuctionSource,
}

impl<'a> Collector<'a> {
    pub fn new(source: &'a dyn AuctionSource) -> Self {
        Self { source }
    }

    pub async fn collect<S>(
        &self,
        realms: &[Realm],
        auction_houses: &[AuctionHouse],
        sink: &mut S,
    ) -> Result<CollectStats, PipelineError>
    where
        S: RecordSink + ?Sized,
    {
        let total = work_set_size(realms, auction_houses);
        let mut stats = CollectStats::default();

        for (index, item) in enumerate(realms, auction_houses).enumerate() {
            let (realm, auction_house) = (item.realm, item.auction_house);
            info!(
                pair = index + 1,
                total,
                "fetching auctions for realm {} ({}), auction house {} ({})",
                realm.name,
                realm.id,
                auction_house.name,
                auction_house.id
            );

            let start = Instant::now();
            let listings = self
                .source
                .get_auctions(realm.id, auction_house.id)
                .await
                .context(CollectSnafu {
                    realm_id: realm.id,
                    auction_house_id: auction_house.id,
                })?;
            emit!(FetchDuration {
                duration: start.elapsed()
            });
            emit!(ListingsFetched {
                count: listings.len() as u64
            });

            info!("writing {} auctions to file", listings.len());

            let mut zero_quantity = 0;
            for listing in &listings {
                if listing.quantity == 0 {
                    zero_quantity += 1;
                }
                sink.append(transform(listing, realm.id, auction_house.id))
                    .context(AppendSnafu)?;
            }

            if zero_quantity > 0 {
                warn!(
                    realm = realm.id,
                    auction_house = auction_house.id,
                    count = zero_quantity,
                    "Listings with zero quantity exported with buyout_each = 0"
                );
                emit!(ZeroQuantityListings {
                    count: zero_quantity as u64
                });
            }

            stats.pairs += 1;
            stats.records += listings.len();
            stats.zero_quantity += zero_quantity;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, WriterError};
    use crate::model::{RawListing, Record};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns one listing per pair, with the realm id as item id, and
    /// fails on the configured call.
    struct FakeSource {
        calls: Mutex<Vec<(i32, i32)>>,
        fail_on_call: Option<usize>,
    }

    impl FakeSource {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on_call,
            }
        }

        fn calls(&self) -> Vec<(i32, i32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuctionSource for FakeSource {
        async fn get_auctions(
            &self,
            realm_id: i32,
            auction_house_id: i32,
        ) -> Result<Vec<RawListing>, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((realm_id, auction_house_id));
                calls.len()
            };
            if self.fail_on_call == Some(call) {
                return Err(FetchError::Status {
                    url: "http://test/auctions".to_string(),
                    status: 500,
                    body: String::new(),
                });
            }
            Ok(vec![RawListing {
                item_id: realm_id as i64,
                bid: 0,
                buyout: 100,
                quantity: if auction_house_id == 7 { 0 } else { 2 },
                time_left: "MEDIUM".to_string(),
            }])
        }
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn append(&mut self, _record: Record) -> Result<(), WriterError> {
            Err(WriterError::FileIo {
                source: std::io::Error::other("disk full"),
            })
        }
    }

    fn realms() -> Vec<Realm> {
        vec![
            Realm {
                id: 1,
                name: "Living Flame".to_string(),
            },
            Realm {
                id: 2,
                name: "Crusader Strike".to_string(),
            },
        ]
    }

    fn auction_houses() -> Vec<AuctionHouse> {
        vec![
            AuctionHouse {
                id: 2,
                name: "Alliance".to_string(),
            },
            AuctionHouse {
                id: 6,
                name: "Horde".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_collects_pairs_in_realm_major_order() {
        let source = FakeSource::new(None);
        let mut records: Vec<Record> = Vec::new();

        let stats = Collector::new(&source)
            .collect(&realms(), &auction_houses(), &mut records)
            .await
            .unwrap();

        assert_eq!(source.calls(), vec![(1, 2), (1, 6), (2, 2), (2, 6)]);
        assert_eq!(
            stats,
            CollectStats {
                pairs: 4,
                records: 4,
                zero_quantity: 0
            }
        );
        let pairs: Vec<(i32, i32)> = records
            .iter()
            .map(|r| (r.realm_id, r.auction_house_id))
            .collect();
        assert_eq!(pairs, source.calls());
        assert!(records.iter().all(|r| r.buyout_each == 50 && r.time_left == 2));
    }

    #[tokio::test]
    async fn test_stops_at_first_failed_fetch() {
        let source = FakeSource::new(Some(2));
        let mut records: Vec<Record> = Vec::new();

        let err = Collector::new(&source)
            .collect(&realms(), &auction_houses(), &mut records)
            .await
            .unwrap_err();

        match err {
            PipelineError::Collect {
                realm_id,
                auction_house_id,
                ..
            } => assert_eq!((realm_id, auction_house_id), (1, 6)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.calls().len(), 2);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_append_failure_stops_collection() {
        let source = FakeSource::new(None);

        let err = Collector::new(&source)
            .collect(&realms(), &auction_houses(), &mut FailingSink)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Append { .. }));
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_quantity_listings_are_kept_and_counted() {
        let source = FakeSource::new(None);
        let houses = vec![AuctionHouse {
            id: 7,
            name: "Neutral".to_string(),
        }];
        let mut records: Vec<Record> = Vec::new();

        let stats = Collector::new(&source)
            .collect(&realms(), &houses, &mut records)
            .await
            .unwrap();

        assert_eq!(stats.zero_quantity, 2);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.quantity == 0 && r.buyout_each == 0));
    }

    #[tokio::test]
    async fn test_empty_reference_lists_collect_nothing() {
        let source = FakeSource::new(None);
        let mut records: Vec<Record> = Vec::new();

        let stats = Collector::new(&source)
            .collect(&[], &auction_houses(), &mut records)
            .await
            .unwrap();

        assert_eq!(stats, CollectStats::default());
        assert!(source.calls().is_empty());
    }
}
