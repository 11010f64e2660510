use serde::{Deserialize, Serialize};
use std::fmt;

pub mod change_set;
pub mod listing;
pub mod snapshot;

// Re-exports for convenience
pub use change_set::*;
pub use listing::*;
pub use snapshot::*;

/// Stock signal of a listing. `Unknown` is a real state, not a missing `false`.
///
/// Stored as a nullable boolean so snapshot files stay readable
/// (`true`, `false`, `null`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    Unknown,
}

impl StockStatus {
    pub fn is_in_stock(self) -> bool {
        self == StockStatus::InStock
    }

    /// Anything short of a confirmed `InStock` needs a live re-check.
    pub fn is_uncertain(self) -> bool {
        !self.is_in_stock()
    }
}

impl From<Option<bool>> for StockStatus {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => StockStatus::InStock,
            Some(false) => StockStatus::OutOfStock,
            None => StockStatus::Unknown,
        }
    }
}

impl From<StockStatus> for Option<bool> {
    fn from(value: StockStatus) -> Self {
        match value {
            StockStatus::InStock => Some(true),
            StockStatus::OutOfStock => Some(false),
            StockStatus::Unknown => None,
        }
    }
}

impl From<bool> for StockStatus {
    fn from(value: bool) -> Self {
        StockStatus::from(Some(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Added,
    PriceDrop,
    Restock,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Added => "added",
            NotificationKind::PriceDrop => "price_drop",
            NotificationKind::Restock => "restock",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
