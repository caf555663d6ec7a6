//! Order settlement tests
//!
//! Checkout validation against authoritative prices, the order status
//! machine and stock spending at processing time.

use std::collections::HashMap;
use std::str::FromStr;

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    plan_stock_deltas, validate_order, LedgerCounters, NewOrder, NewOrderLine, OrderStatus,
    SettlementError, StockMovementKind,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn order(lines: Vec<NewOrderLine>, sum_price: Decimal) -> NewOrder {
    NewOrder {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        phone: "+15550100".to_string(),
        email: None,
        comment: None,
        delivery_type: "courier".to_string(),
        payment_type: "card".to_string(),
        sum_price,
        lines,
        deliveries: Vec::new(),
    }
}

fn line(product_id: Uuid, quantity: i32, price_for_quantity: Decimal) -> NewOrderLine {
    NewOrderLine {
        product_id,
        quantity,
        price_for_quantity,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 3.75 x 10 = 37.50 is accepted; 37.00 is a price mismatch
    #[test]
    fn test_line_price_identity() {
        let p = Uuid::from_u128(1);
        let prices = HashMap::from([(p, dec("3.75"))]);

        let ok = order(vec![line(p, 10, dec("37.50"))], dec("37.50"));
        assert_eq!(validate_order(&ok, Decimal::ZERO, &prices), Ok(dec("37.50")));

        let bad = order(vec![line(p, 10, dec("37.00"))], dec("37.00"));
        match validate_order(&bad, Decimal::ZERO, &prices) {
            Err(err @ SettlementError::PriceMismatch { .. }) => {
                assert_eq!(err.code(), "PRICE_MISMATCH");
            }
            other => panic!("expected price mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_header_sum_must_match_lines() {
        let p = Uuid::from_u128(1);
        let q = Uuid::from_u128(2);
        let prices = HashMap::from([(p, dec("250")), (q, dec("100"))]);

        let o = order(
            vec![line(p, 1, dec("250")), line(q, 2, dec("200"))],
            dec("449.99"),
        );
        assert_eq!(
            validate_order(&o, dec("400"), &prices),
            Err(SettlementError::SumMismatch {
                computed: dec("450"),
                submitted: dec("449.99"),
            })
        );
    }

    /// The minimum is enforced even when no price is known
    #[test]
    fn test_minimum_total_checked_first() {
        let o = order(vec![line(Uuid::from_u128(9), 1, dec("10"))], dec("10"));
        let err = validate_order(&o, dec("400"), &HashMap::new()).unwrap_err();
        assert_eq!(err.code(), "BELOW_MINIMUM_TOTAL");
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let missing = Uuid::from_u128(42);
        let o = order(vec![line(missing, 1, dec("500"))], dec("500"));
        assert_eq!(
            validate_order(&o, dec("400"), &HashMap::new()),
            Err(SettlementError::UnknownProduct(missing))
        );
    }

    #[test]
    fn test_status_machine() {
        use OrderStatus::*;

        assert!(InProgress.can_transition_to(Processed));
        assert!(Processed.can_transition_to(Completed));

        for (from, to) in [
            (InProgress, Completed),
            (Processed, Processed),
            (Processed, InProgress),
            (Completed, InProgress),
            (Completed, Processed),
        ] {
            assert!(!from.can_transition_to(to), "{} -> {} must be rejected", from, to);
        }

        assert!(Completed.is_terminal());
        assert!(InProgress.decrements_stock_on(Processed));
        assert!(!Processed.decrements_stock_on(Completed));
    }

    /// Two processings of 5 units against a stock of 8
    #[test]
    fn test_concurrent_processing_rejects_second_by_default() {
        let spend = StockMovementKind::OrderSpend.counter_delta(5);
        let start = LedgerCounters {
            amount_in_stock: 8,
            ..LedgerCounters::default()
        };

        assert!(start.admits(spend, false));
        let after_first = start.apply(spend);
        assert_eq!(after_first.amount_in_stock, 3);

        // Second transaction sees the committed row and is refused
        assert!(!after_first.admits(spend, false));
        assert_eq!(after_first.amount_in_stock, 3);
    }

    #[test]
    fn test_concurrent_processing_goes_negative_with_backorders() {
        let spend = StockMovementKind::OrderSpend.counter_delta(5);
        let start = LedgerCounters {
            amount_in_stock: 8,
            ..LedgerCounters::default()
        };

        let after_first = start.apply(spend);
        assert!(after_first.admits(spend, true));
        let after_second = after_first.apply(spend);
        assert_eq!(after_second.amount_in_stock, -2);
        assert_eq!(after_second.current_spend, 10);
    }

    #[test]
    fn test_repeated_lines_spend_once_per_product() {
        let p = Uuid::from_u128(3);
        let deltas = plan_stock_deltas([(p, 2), (p, 3)]);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].quantity, 5);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Lines priced from the catalog always pass
    #[test]
    fn prop_catalog_priced_orders_accepted(
        cents in prop::collection::vec(1i64..100_000, 1..6),
        quantities in prop::collection::vec(1i32..50, 6),
    ) {
        let mut prices = HashMap::new();
        let mut lines = Vec::new();
        let mut total = Decimal::ZERO;
        for (i, c) in cents.iter().enumerate() {
            let id = Uuid::from_u128(i as u128 + 1);
            let unit = Decimal::new(*c, 2);
            let q = quantities[i];
            prices.insert(id, unit);
            let price_for_quantity = unit * Decimal::from(q);
            total += price_for_quantity;
            lines.push(line(id, q, price_for_quantity));
        }

        let o = order(lines, total);
        prop_assert_eq!(validate_order(&o, Decimal::ZERO, &prices), Ok(total));
    }

    /// Rejection is a pure function of the input
    #[test]
    fn prop_rejection_is_idempotent(cents in 1i64..100_000, q in 2i32..50, off in 1i64..100) {
        let id = Uuid::from_u128(7);
        let unit = Decimal::new(cents, 2);
        let prices = HashMap::from([(id, unit)]);
        let submitted = unit * Decimal::from(q) - Decimal::new(off, 2);
        let o = order(vec![line(id, q, submitted)], submitted);

        let first = validate_order(&o, Decimal::ZERO, &prices);
        let second = validate_order(&o, Decimal::ZERO, &prices);
        prop_assert!(first.is_err());
        prop_assert_eq!(first, second);
    }

    /// Under the default policy stock never goes below zero
    #[test]
    fn prop_floor_holds_without_backorders(
        stock in 0i64..100,
        spends in prop::collection::vec(1i64..20, 0..20),
    ) {
        let mut counters = LedgerCounters { amount_in_stock: stock, ..LedgerCounters::default() };
        for q in spends {
            let delta = StockMovementKind::OrderSpend.counter_delta(q);
            if counters.admits(delta, false) {
                counters = counters.apply(delta);
            }
            prop_assert!(counters.amount_in_stock >= 0);
        }
    }
}
