//! Supply intake tests
//!
//! Line arithmetic, the payment balance, the sum tolerance and the stock
//! round trip of recording then deleting a supply.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    plan_stock_deltas, validate_supply, within_tolerance, LedgerCounters, NewSupply,
    NewSupplyPayment, NewSupplyProduct, SettlementError, StockMovementKind, SUM_TOLERANCE,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn product(id: u128, amount: i32, price: &str, tax: &str, without: &str, total: &str) -> NewSupplyProduct {
    NewSupplyProduct {
        product_id: Uuid::from_u128(id),
        amount,
        price_for_unit: dec(price),
        tax: dec(tax),
        sum_without_tax: dec(without),
        total_sum: dec(total),
    }
}

fn supply(products: Vec<NewSupplyProduct>, payments: &[&str]) -> NewSupply {
    NewSupply {
        supplier: "Acme Wholesale".to_string(),
        supply_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        comment: None,
        payments: payments
            .iter()
            .map(|p| NewSupplyPayment {
                account: "main".to_string(),
                payment_sum: dec(p),
            })
            .collect(),
        products,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_tolerance_is_one_nanounit() {
        assert_eq!(SUM_TOLERANCE, dec("0.000000001"));
        assert!(within_tolerance(dec("1"), dec("1.000000001")));
        assert!(!within_tolerance(dec("1"), dec("1.000000002")));
    }

    /// 100 x 2.00 = 200.00, tax 20% -> 240.00
    #[test]
    fn test_taxed_line_accepted() {
        let s = supply(vec![product(1, 100, "2.00", "20", "200.00", "240.00")], &["240.00"]);
        assert_eq!(validate_supply(&s), Ok(dec("240.00")));
    }

    #[test]
    fn test_taxed_line_off_by_a_cent_rejected() {
        let s = supply(vec![product(1, 100, "2.00", "20", "200.00", "239.99")], &["239.99"]);
        match validate_supply(&s) {
            Err(SettlementError::InvalidTotalSum { line, expected, submitted }) => {
                assert_eq!(line, 0);
                assert_eq!(expected, dec("240"));
                assert_eq!(submitted, dec("239.99"));
            }
            other => panic!("expected invalid total, got {:?}", other),
        }
    }

    #[test]
    fn test_payments_must_cover_products() {
        let s = supply(
            vec![
                product(1, 10, "1.50", "0", "15.00", "15.00"),
                product(2, 4, "2.50", "10", "10.00", "11.00"),
            ],
            &["20.00", "5.00"],
        );
        assert_eq!(
            validate_supply(&s),
            Err(SettlementError::PaymentSumMismatch {
                products_sum: dec("26.00"),
                payments_sum: dec("25.00"),
            })
        );
    }

    #[test]
    fn test_split_payments_accepted() {
        let s = supply(
            vec![product(1, 10, "1.50", "0", "15.00", "15.00")],
            &["10.00", "5.00"],
        );
        assert_eq!(validate_supply(&s), Ok(dec("15.00")));
    }

    #[test]
    fn test_tax_above_hundred_rejected() {
        let s = supply(vec![product(1, 1, "1", "101", "1", "2.01")], &["2.01"]);
        assert_eq!(validate_supply(&s).unwrap_err().code(), "INVALID_TAX");
    }

    #[test]
    fn test_sum_without_tax_mismatch() {
        let s = supply(vec![product(1, 3, "1.10", "0", "3.20", "3.20")], &["3.20"]);
        assert_eq!(validate_supply(&s).unwrap_err().code(), "INVALID_SUM_WITHOUT_TAX");
    }

    #[test]
    fn test_supply_then_delete_restores_ledger() {
        let lines = [(Uuid::from_u128(1), 4i64), (Uuid::from_u128(2), 7), (Uuid::from_u128(1), 6)];
        let deltas = plan_stock_deltas(lines);
        let mut ledger: HashMap<Uuid, LedgerCounters> = HashMap::new();

        for d in &deltas {
            let c = ledger.entry(d.product_id).or_default();
            *c = c.apply(StockMovementKind::Supply.counter_delta(d.quantity));
        }
        assert_eq!(ledger[&Uuid::from_u128(1)].amount_in_stock, 10);
        assert_eq!(ledger[&Uuid::from_u128(1)].current_supply, 10);

        for d in &deltas {
            let c = ledger.get_mut(&d.product_id).unwrap();
            *c = c.apply(StockMovementKind::SupplyReversal.counter_delta(d.quantity));
        }
        assert!(ledger.values().all(|c| *c == LedgerCounters::default()));
    }

    /// Deleting a supply whose units were already sold is refused by default
    #[test]
    fn test_reversal_respects_floor() {
        let sold_out = LedgerCounters {
            amount_in_stock: 2,
            current_supply: 10,
            current_spend: 8,
            current_write_off: 0,
        };
        let reversal = StockMovementKind::SupplyReversal.counter_delta(10);
        assert!(!sold_out.admits(reversal, false));
        assert!(sold_out.admits(reversal, true));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Correctly computed lines are accepted for any tax percentage
    #[test]
    fn prop_computed_lines_accepted(
        amount in 1i32..1000,
        price_cents in 0i64..100_000,
        tax_hundredths in 0i64..=10_000,
    ) {
        let price = Decimal::new(price_cents, 2);
        let tax = Decimal::new(tax_hundredths, 2);
        let without = price * Decimal::from(amount);
        let total = without * (Decimal::ONE + tax / Decimal::ONE_HUNDRED);

        let s = NewSupply {
            supplier: "Acme".to_string(),
            supply_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            comment: None,
            payments: vec![NewSupplyPayment { account: "main".to_string(), payment_sum: total.max(Decimal::new(1, 2)) }],
            products: vec![NewSupplyProduct {
                product_id: Uuid::from_u128(1),
                amount,
                price_for_unit: price,
                tax,
                sum_without_tax: without,
                total_sum: total,
            }],
        };

        let result = validate_supply(&s);
        if total > Decimal::ZERO {
            prop_assert_eq!(result, Ok(total));
        } else {
            // A zero-priced delivery cannot carry a positive payment that balances
            prop_assert_eq!(result.unwrap_err().code(), "PAYMENT_SUM_MISMATCH");
        }
    }

    /// Applying a supply and then its reversal leaves every counter unchanged
    #[test]
    fn prop_round_trip_restores_counters(
        start in 0i64..1000,
        amounts in prop::collection::vec((1u128..5, 1i64..100), 1..10),
    ) {
        let deltas = plan_stock_deltas(amounts.iter().map(|(id, q)| (Uuid::from_u128(*id), *q)));
        let initial = LedgerCounters { amount_in_stock: start, ..LedgerCounters::default() };
        let mut ledger: HashMap<Uuid, LedgerCounters> = HashMap::new();

        for d in &deltas {
            let c = ledger.entry(d.product_id).or_insert(initial);
            *c = c.apply(StockMovementKind::Supply.counter_delta(d.quantity));
        }
        for d in &deltas {
            let c = ledger.get_mut(&d.product_id).unwrap();
            let reversal = StockMovementKind::SupplyReversal.counter_delta(d.quantity);
            prop_assert!(c.admits(reversal, false));
            *c = c.apply(reversal);
        }

        for c in ledger.values() {
            prop_assert_eq!(*c, initial);
        }
    }

    /// Payment totals off by more than the tolerance are rejected
    #[test]
    fn prop_unbalanced_payments_rejected(cents in 100i64..1_000_000, off in 1i64..100) {
        let total = Decimal::new(cents, 2);
        let s = NewSupply {
            supplier: "Acme".to_string(),
            supply_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            comment: None,
            payments: vec![NewSupplyPayment { account: "main".to_string(), payment_sum: total + Decimal::new(off, 2) }],
            products: vec![NewSupplyProduct {
                product_id: Uuid::from_u128(1),
                amount: 1,
                price_for_unit: total,
                tax: Decimal::ZERO,
                sum_without_tax: total,
                total_sum: total,
            }],
        };

        prop_assert_eq!(validate_supply(&s).unwrap_err().code(), "PAYMENT_SUM_MISMATCH");
    }
}
