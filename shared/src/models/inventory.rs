//! Stocktaking documents and the variance they produce

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SettlementError;

/// A physical count of some products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventory {
    pub comment: Option<String>,
    pub products: Vec<CountedProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountedProduct {
    pub product_id: Uuid,
    pub real_amount: i64,
}

/// Planned vs counted figures for one product at stocktaking time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryVariance {
    pub initial_amount: i64,
    pub supply_amount: i64,
    pub spend_amount: i64,
    pub planned_amount: i64,
    pub real_amount: i64,
    pub unit_price: Decimal,
    pub real_amount_price: Decimal,
    /// planned minus real; positive means shrinkage
    pub difference: i64,
    pub difference_price: Decimal,
    pub write_off_amount: i64,
    pub write_off_price: Decimal,
}

impl InventoryVariance {
    /// Fails instead of wrapping when a figure leaves the i64 or Decimal range
    pub fn compute(
        initial_amount: i64,
        supply_amount: i64,
        spend_amount: i64,
        real_amount: i64,
        unit_price: Decimal,
    ) -> Result<Self, SettlementError> {
        let out_of_range = || SettlementError::invalid("real_amount", "variance is out of range");

        let planned_amount = initial_amount
            .checked_add(supply_amount)
            .and_then(|v| v.checked_sub(spend_amount))
            .ok_or_else(out_of_range)?;
        let difference = planned_amount
            .checked_sub(real_amount)
            .ok_or_else(out_of_range)?;
        let difference_price = Decimal::from(difference)
            .checked_mul(unit_price)
            .ok_or_else(out_of_range)?;
        let real_amount_price = Decimal::from(real_amount)
            .checked_mul(unit_price)
            .ok_or_else(out_of_range)?;
        let (write_off_amount, write_off_price) = if difference > 0 {
            (difference, difference_price)
        } else {
            (0, Decimal::ZERO)
        };

        Ok(Self {
            initial_amount,
            supply_amount,
            spend_amount,
            planned_amount,
            real_amount,
            unit_price,
            real_amount_price,
            difference,
            difference_price,
            write_off_amount,
            write_off_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Helper to create Decimal from string
    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_shrinkage_is_written_off() {
        // 10 + 5 - 3 = 12 planned, 9 counted
        let v = InventoryVariance::compute(10, 5, 3, 9, dec("2.50")).unwrap();
        assert_eq!(v.planned_amount, 12);
        assert_eq!(v.difference, 3);
        assert_eq!(v.difference_price, dec("7.50"));
        assert_eq!(v.write_off_amount, 3);
        assert_eq!(v.write_off_price, dec("7.50"));
        assert_eq!(v.real_amount_price, dec("22.50"));
    }

    #[test]
    fn test_surplus_is_not_written_off() {
        let v = InventoryVariance::compute(10, 0, 0, 12, dec("1")).unwrap();
        assert_eq!(v.difference, -2);
        assert_eq!(v.difference_price, dec("-2"));
        assert_eq!(v.write_off_amount, 0);
        assert_eq!(v.write_off_price, Decimal::ZERO);
    }

    #[test]
    fn test_exact_count() {
        let v = InventoryVariance::compute(4, 6, 2, 8, dec("3.75")).unwrap();
        assert_eq!(v.difference, 0);
        assert_eq!(v.write_off_amount, 0);
    }

    #[test]
    fn test_huge_count_against_backordered_stock_is_rejected() {
        let err = InventoryVariance::compute(0, 0, 2, i64::MAX, dec("1")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.field().as_deref(), Some("real_amount"));
    }

    #[test]
    fn test_price_overflow_is_rejected() {
        let result = InventoryVariance::compute(0, 0, 0, i64::MAX, dec("9999999999.99"));
        assert!(matches!(result, Err(SettlementError::InvalidField { .. })));
    }

    #[test]
    fn test_largest_valid_count_at_largest_price() {
        let v = InventoryVariance::compute(0, 0, 0, i64::from(i32::MAX), dec("9999999999.99"))
            .unwrap();
        assert_eq!(v.difference, -i64::from(i32::MAX));
        assert_eq!(v.write_off_amount, 0);
    }
}
