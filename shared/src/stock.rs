//! Ledger effects of settlement documents
//!
//! The ledger row of a product carries `amount_in_stock` and three period
//! counters. Supplies, supply reversals and processed orders change them by
//! relative amounts; a stock count replaces them. This module plans those
//! changes so the backend can issue them as row-relative updates in a fixed
//! product order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a product's stock moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockMovementKind {
    Supply,
    SupplyReversal,
    OrderSpend,
    InventoryCorrection,
}

impl StockMovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockMovementKind::Supply => "SUPPLY",
            StockMovementKind::SupplyReversal => "SUPPLY_REVERSAL",
            StockMovementKind::OrderSpend => "ORDER_SPEND",
            StockMovementKind::InventoryCorrection => "INVENTORY_CORRECTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUPPLY" => Some(StockMovementKind::Supply),
            "SUPPLY_REVERSAL" => Some(StockMovementKind::SupplyReversal),
            "ORDER_SPEND" => Some(StockMovementKind::OrderSpend),
            "INVENTORY_CORRECTION" => Some(StockMovementKind::InventoryCorrection),
            _ => None,
        }
    }

    /// Counter changes for moving `quantity` units of this kind
    pub fn counter_delta(self, quantity: i64) -> CounterDelta {
        match self {
            StockMovementKind::Supply => CounterDelta {
                stock: quantity,
                supply: quantity,
                spend: 0,
            },
            StockMovementKind::SupplyReversal => CounterDelta {
                stock: -quantity,
                supply: -quantity,
                spend: 0,
            },
            StockMovementKind::OrderSpend => CounterDelta {
                stock: -quantity,
                supply: 0,
                spend: quantity,
            },
            // Counts replace the counters; only the stock change is journaled
            StockMovementKind::InventoryCorrection => CounterDelta {
                stock: quantity,
                supply: 0,
                spend: 0,
            },
        }
    }
}

impl fmt::Display for StockMovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed change to the ledger counters of one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterDelta {
    pub stock: i64,
    pub supply: i64,
    pub spend: i64,
}

impl CounterDelta {
    pub fn lowers_stock(&self) -> bool {
        self.stock < 0
    }
}

/// Total quantity of one product moved by a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Fold document lines into one delta per product, ordered by product id.
///
/// Lines for the same product are summed and zero totals dropped. Applying
/// the result in order keeps row locks acquired in the same sequence by every
/// transaction.
pub fn plan_stock_deltas<I>(lines: I) -> Vec<StockDelta>
where
    I: IntoIterator<Item = (Uuid, i64)>,
{
    let mut totals: BTreeMap<Uuid, i64> = BTreeMap::new();
    for (product_id, quantity) in lines {
        *totals.entry(product_id).or_insert(0) += quantity;
    }

    totals
        .into_iter()
        .filter(|(_, quantity)| *quantity != 0)
        .map(|(product_id, quantity)| StockDelta {
            product_id,
            quantity,
        })
        .collect()
}

/// Snapshot of a product's ledger counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerCounters {
    pub amount_in_stock: i64,
    pub current_supply: i64,
    pub current_spend: i64,
    pub current_write_off: i64,
}

impl LedgerCounters {
    /// Stock at the start of the current period, assuming no drift
    pub fn derived_initial_amount(&self) -> i64 {
        self.amount_in_stock - self.current_supply + self.current_spend
    }

    /// Same arithmetic the row-relative update performs in storage
    pub fn apply(&self, delta: CounterDelta) -> LedgerCounters {
        LedgerCounters {
            amount_in_stock: self.amount_in_stock + delta.stock,
            current_supply: self.current_supply + delta.supply,
            current_spend: self.current_spend + delta.spend,
            current_write_off: self.current_write_off,
        }
    }

    /// Whether a delta is admissible under the no-negative-stock policy
    pub fn admits(&self, delta: CounterDelta, allow_negative: bool) -> bool {
        allow_negative || !delta.lowers_stock() || self.amount_in_stock + delta.stock >= 0
    }

    /// Counters after a stock count: stock equals the count, period restarts
    pub fn counted(real_amount: i64) -> LedgerCounters {
        LedgerCounters {
            amount_in_stock: real_amount,
            ..LedgerCounters::default()
        }
    }
}
