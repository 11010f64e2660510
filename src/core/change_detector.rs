use crate::core::price_parser::parse_price;
use crate::models::{ChangeSet, Listing, PriceDrop, Snapshot, StockStatus};

/// Compares the previous snapshot of a source group with a fresh one.
///
/// The result is a pure function of both snapshots and follows the iteration
/// order of `new`. Listings missing from `new` are not reported.
pub fn detect(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let previous = old.index_by_id();
    let mut changes = ChangeSet::default();

    for listing in new.listings() {
        let Some(before) = previous.get(&listing.id) else {
            changes.added.push(listing.clone());
            continue;
        };

        if let Some(drop) = price_drop(before, listing) {
            changes.price_dropped.push(drop);
        }

        if is_restock(before, listing) {
            changes.restocked.push(listing.clone());
        }
    }

    changes
}

fn price_drop(before: &Listing, after: &Listing) -> Option<PriceDrop> {
    let old_price = parse_price(&before.price_raw)?;
    let new_price = parse_price(&after.price_raw)?;

    (new_price < old_price).then(|| PriceDrop {
        listing: after.clone(),
        old_price,
        new_price,
    })
}

/// Only a confirmed `OutOfStock` → `InStock` transition counts.
fn is_restock(before: &Listing, after: &Listing) -> bool {
    before.in_stock == StockStatus::OutOfStock && after.in_stock == StockStatus::InStock
}
