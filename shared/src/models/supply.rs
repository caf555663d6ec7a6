//! Supplier deliveries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A delivery of stock from a supplier with its payment allocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupply {
    pub supplier: String,
    pub supply_time: DateTime<Utc>,
    pub comment: Option<String>,
    pub payments: Vec<NewSupplyPayment>,
    pub products: Vec<NewSupplyProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplyPayment {
    pub account: String,
    pub payment_sum: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplyProduct {
    pub product_id: Uuid,
    pub amount: i32,
    pub price_for_unit: Decimal,
    /// Tax percentage, 0 to 100
    pub tax: Decimal,
    pub sum_without_tax: Decimal,
    pub total_sum: Decimal,
}
