//! Customer orders and their status lifecycle

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status. Moves forward only: IN_PROGRESS -> PROCESSED -> COMPLETED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    InProgress,
    Processed,
    Completed,
}

/// Every permitted (from, to) pair
const ORDER_TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::InProgress, OrderStatus::Processed),
    (OrderStatus::Processed, OrderStatus::Completed),
];

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::InProgress,
        OrderStatus::Processed,
        OrderStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        ORDER_TRANSITIONS.contains(&(self, next))
    }

    /// Processing is the point where stock leaves the ledger
    pub fn decrements_stock_on(self, next: OrderStatus) -> bool {
        self == OrderStatus::InProgress && next == OrderStatus::Processed
    }

    pub fn is_terminal(self) -> bool {
        !Self::ALL.iter().any(|next| self.can_transition_to(*next))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(OrderStatus::InProgress),
            "PROCESSED" => Ok(OrderStatus::Processed),
            "COMPLETED" => Ok(OrderStatus::Completed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// Checkout document submitted by a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub comment: Option<String>,
    /// Delivery type title, resolved to an id at commit
    pub delivery_type: String,
    /// Payment type title, resolved to an id at commit
    pub payment_type: String,
    /// Client-submitted total, checked against authoritative prices
    pub sum_price: Decimal,
    pub lines: Vec<NewOrderLine>,
    #[serde(default)]
    pub deliveries: Vec<NewOrderDelivery>,
}

impl NewOrder {
    pub fn product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_for_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderDelivery {
    pub address: String,
    pub delivery_time: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}
