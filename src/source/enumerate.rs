//! Realm-major enumeration of the (realm, auction house) work set.

use crate::model::{AuctionHouse, Realm, WorkItem};

/// Cross product of realms and auction houses, realms outer.
///
/// Input order is preserved and nothing is filtered or deduplicated.
/// An empty list on either side yields nothing.
pub fn enumerate<'a>(
    realms: &'a [Realm],
    auction_houses: &'a [AuctionHouse],
) -> impl Iterator<Item = WorkItem<'a>> + 'a {
    realms.iter().flat_map(move |realm| {
        auction_houses
            .iter()
            .map(move |auction_house| WorkItem {
                realm,
                auction_house,
            })
    })
}

/// Number of pairs [`enumerate`] will yield.
pub fn work_set_size(realms: &[Realm], auction_houses: &[AuctionHouse]) -> usize {
    realms.len() * auction_houses.len()
}
