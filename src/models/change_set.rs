use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Listing, NotificationKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceDrop {
    pub listing: Listing,
    pub old_price: Decimal,
    pub new_price: Decimal,
}

/// Classified output of one detection pass.
///
/// A listing that both dropped in price and came back in stock appears in
/// `price_dropped` and in `restocked`; notifiers deduplicate per listing id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<Listing>,
    pub price_dropped: Vec<PriceDrop>,
    pub restocked: Vec<Listing>,
}

/// One listing inside a notification, with the previous price for price drops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangedListing {
    pub listing: Listing,
    pub old_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub source_group: String,
    pub items: Vec<ChangedListing>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.price_dropped.is_empty() && self.restocked.is_empty()
    }

    /// One event per non-empty kind, in `added`, `price_drop`, `restock` order.
    pub fn into_events(self, source_group: &str) -> Vec<NotificationEvent> {
        let added: Vec<ChangedListing> = self
            .added
            .into_iter()
            .map(|listing| ChangedListing {
                listing,
                old_price: None,
            })
            .collect();
        let dropped: Vec<ChangedListing> = self
            .price_dropped
            .into_iter()
            .map(|drop| ChangedListing {
                listing: drop.listing,
                old_price: Some(drop.old_price),
            })
            .collect();
        let restocked: Vec<ChangedListing> = self
            .restocked
            .into_iter()
            .map(|listing| ChangedListing {
                listing,
                old_price: None,
            })
            .collect();

        [
            (NotificationKind::Added, added),
            (NotificationKind::PriceDrop, dropped),
            (NotificationKind::Restock, restocked),
        ]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(kind, items)| NotificationEvent {
            kind,
            source_group: source_group.to_string(),
            items,
        })
        .collect()
    }

    /// Keeps only the restock class; used by the stock-only pass.
    pub fn restocks_only(self) -> ChangeSet {
        ChangeSet {
            added: Vec::new(),
            price_dropped: Vec::new(),
            restocked: self.restocked,
        }
    }
}
