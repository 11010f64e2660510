use std::collections::{HashMap, HashSet};

use crate::models::{Listing, ListingId};

/// Last known-good state of one source group.
///
/// Holds at most one listing per id; order carries no meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    source_group: String,
    listings: Vec<Listing>,
}

impl Snapshot {
    /// Builds a snapshot, keeping the first occurrence of every id.
    pub fn new(source_group: impl Into<String>, listings: Vec<Listing>) -> Self {
        let mut seen = HashSet::with_capacity(listings.len());
        let listings = listings
            .into_iter()
            .filter(|listing| seen.insert(listing.id.clone()))
            .collect();

        Self {
            source_group: source_group.into(),
            listings,
        }
    }

    pub fn empty(source_group: impl Into<String>) -> Self {
        Self {
            source_group: source_group.into(),
            listings: Vec::new(),
        }
    }

    pub fn source_group(&self) -> &str {
        &self.source_group
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn index_by_id(&self) -> HashMap<&ListingId, &Listing> {
        self.listings.iter().map(|listing| (&listing.id, listing)).collect()
    }

    /// Copies the stock status and `last_seen_at` of `updates` onto listings with
    /// the same id. Everything else, and ids this snapshot lacks, is left alone.
    pub fn merge_stock_updates(mut self, updates: Vec<Listing>) -> Self {
        let updates: HashMap<ListingId, Listing> = updates
            .into_iter()
            .map(|listing| (listing.id.clone(), listing))
            .collect();

        for listing in &mut self.listings {
            if let Some(updated) = updates.get(&listing.id) {
                listing.in_stock = updated.in_stock;
                listing.last_seen_at = updated.last_seen_at;
            }
        }
        self
    }
}
