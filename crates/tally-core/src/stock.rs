//! # Stock Levels
//!
//! Buckets products by `stock_quantity` against `reorder_level`.
//!
//! ```text
//!   0            reorder_level
//!   │                 │
//!   ▼                 ▼
//!   ●─────────────────●──────────────────────►  stock_quantity
//!   OUT   │      LOW       │       IN
//!   qty=0 │ 0 < qty <= rl  │   qty > rl
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Stock classification of a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockLevel {
    /// Classifies a quantity. Anything at or below zero is out of stock.
    pub fn classify(stock_quantity: i64, reorder_level: i64) -> Self {
        if stock_quantity <= 0 {
            StockLevel::OutOfStock
        } else if stock_quantity <= reorder_level {
            StockLevel::LowStock
        } else {
            StockLevel::InStock
        }
    }
}

/// The two columns stock classification needs.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub stock_quantity: i64,
    pub reorder_level: i64,
}

impl StockSnapshot {
    pub fn level(&self) -> StockLevel {
        StockLevel::classify(self.stock_quantity, self.reorder_level)
    }
}

/// Bucket counts over a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSummary {
    pub total: u64,
    pub in_stock: u64,
    pub low_stock: u64,
    pub out_of_stock: u64,
}

impl StockSummary {
    /// Partitions every snapshot into exactly one bucket.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::stock::{StockSnapshot, StockSummary};
    ///
    /// let summary = StockSummary::from_snapshots(&[
    ///     StockSnapshot { stock_quantity: 0, reorder_level: 10 },
    ///     StockSnapshot { stock_quantity: 10, reorder_level: 10 },
    ///     StockSnapshot { stock_quantity: 11, reorder_level: 10 },
    /// ]);
    /// assert_eq!((summary.out_of_stock, summary.low_stock, summary.in_stock), (1, 1, 1));
    /// ```
    pub fn from_snapshots(snapshots: &[StockSnapshot]) -> Self {
        snapshots
            .iter()
            .fold(StockSummary::default(), |mut summary, snapshot| {
                summary.total += 1;
                match snapshot.level() {
                    StockLevel::InStock => summary.in_stock += 1,
                    StockLevel::LowStock => summary.low_stock += 1,
                    StockLevel::OutOfStock => summary.out_of_stock += 1,
                }
                summary
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(stock_quantity: i64, reorder_level: i64) -> StockSnapshot {
        StockSnapshot {
            stock_quantity,
            reorder_level,
        }
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(StockLevel::classify(0, 10), StockLevel::OutOfStock);
        assert_eq!(StockLevel::classify(1, 10), StockLevel::LowStock);
        assert_eq!(StockLevel::classify(10, 10), StockLevel::LowStock);
        assert_eq!(StockLevel::classify(11, 10), StockLevel::InStock);
    }

    #[test]
    fn test_zero_reorder_level() {
        assert_eq!(StockLevel::classify(0, 0), StockLevel::OutOfStock);
        assert_eq!(StockLevel::classify(1, 0), StockLevel::InStock);
    }

    #[test]
    fn test_summary_partitions_everything() {
        let snapshots = vec![snap(0, 5), snap(3, 5), snap(5, 5), snap(6, 5), snap(100, 5)];
        let summary = StockSummary::from_snapshots(&snapshots);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.out_of_stock, 1);
        assert_eq!(summary.low_stock, 2);
        assert_eq!(summary.in_stock, 2);
        assert_eq!(
            summary.total,
            summary.in_stock + summary.low_stock + summary.out_of_stock
        );
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(StockSummary::from_snapshots(&[]), StockSummary::default());
    }
}
