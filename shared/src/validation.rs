//! Settlement rules for orders, supplies and stock counts
//!
//! Every check here runs before a transaction is opened. A document that
//! fails any of them is rejected as a whole and nothing is persisted.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::error::SettlementError;
use crate::models::{NewInventory, NewOrder, NewSupply, NewSupplyProduct};

/// Tolerance for supply sums that go through a tax percentage multiply
pub const SUM_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Upper bound for a counted amount; matches the INTEGER quantities of
/// order and supply lines
pub const MAX_COUNTED_AMOUNT: i64 = i32::MAX as i64;

/// Equal within [`SUM_TOLERANCE`]
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= SUM_TOLERANCE
}

fn require_text(field: &str, value: &str) -> Result<(), SettlementError> {
    if value.trim().is_empty() {
        return Err(SettlementError::invalid(field, "must not be empty"));
    }
    Ok(())
}

fn checked_add(field: &str, a: Decimal, b: Decimal) -> Result<Decimal, SettlementError> {
    a.checked_add(b)
        .ok_or_else(|| SettlementError::invalid(field, "value is out of range"))
}

// ============================================================================
// Orders
// ============================================================================

/// Shape checks that need no prices
pub fn check_order_shape(order: &NewOrder) -> Result<(), SettlementError> {
    require_text("first_name", &order.first_name)?;
    require_text("phone", &order.phone)?;
    require_text("delivery_type", &order.delivery_type)?;
    require_text("payment_type", &order.payment_type)?;

    if order.lines.is_empty() {
        return Err(SettlementError::invalid("lines", "order has no lines"));
    }

    for (i, line) in order.lines.iter().enumerate() {
        if line.quantity <= 0 {
            return Err(SettlementError::invalid(
                format!("lines[{}].quantity", i),
                "quantity must be positive",
            ));
        }
        if line.price_for_quantity.is_sign_negative() {
            return Err(SettlementError::invalid(
                format!("lines[{}].price_for_quantity", i),
                "price must not be negative",
            ));
        }
    }

    for (i, delivery) in order.deliveries.iter().enumerate() {
        require_text(&format!("deliveries[{}].address", i), &delivery.address)?;
    }

    Ok(())
}

/// Minimum order policy, checked before any price lookup
pub fn check_minimum_total(sum_price: Decimal, minimum: Decimal) -> Result<(), SettlementError> {
    if sum_price < minimum {
        return Err(SettlementError::BelowMinimumTotal {
            submitted: sum_price,
            minimum,
        });
    }
    Ok(())
}

/// Recompute every line from authoritative unit prices and compare with the
/// submitted figures. Returns the recomputed order total.
pub fn validate_order_prices(
    order: &NewOrder,
    unit_prices: &HashMap<uuid::Uuid, Decimal>,
) -> Result<Decimal, SettlementError> {
    let mut computed = Decimal::ZERO;

    for (i, line) in order.lines.iter().enumerate() {
        let unit_price = *unit_prices
            .get(&line.product_id)
            .ok_or(SettlementError::UnknownProduct(line.product_id))?;

        let quantity = Decimal::from(line.quantity);
        let mismatch = SettlementError::PriceMismatch {
            line: i,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price,
            submitted: line.price_for_quantity,
        };

        let derived_unit = line.price_for_quantity.checked_div(quantity);
        let line_total = unit_price.checked_mul(quantity);

        if derived_unit != Some(unit_price) || line_total != Some(line.price_for_quantity) {
            return Err(mismatch);
        }

        computed = checked_add("sum_price", computed, line.price_for_quantity)?;
    }

    if computed != order.sum_price {
        return Err(SettlementError::SumMismatch {
            computed,
            submitted: order.sum_price,
        });
    }

    Ok(computed)
}

/// Full order check: shape, minimum, prices and total
pub fn validate_order(
    order: &NewOrder,
    minimum_total: Decimal,
    unit_prices: &HashMap<uuid::Uuid, Decimal>,
) -> Result<Decimal, SettlementError> {
    check_order_shape(order)?;
    check_minimum_total(order.sum_price, minimum_total)?;
    validate_order_prices(order, unit_prices)
}

// ============================================================================
// Supplies
// ============================================================================

/// Check one supply line and return its total
pub fn check_supply_line(index: usize, line: &NewSupplyProduct) -> Result<Decimal, SettlementError> {
    if line.amount <= 0 {
        return Err(SettlementError::invalid(
            format!("products[{}].amount", index),
            "amount must be positive",
        ));
    }
    if line.price_for_unit.is_sign_negative() {
        return Err(SettlementError::invalid(
            format!("products[{}].price_for_unit", index),
            "price must not be negative",
        ));
    }

    let sum_without_tax = line
        .price_for_unit
        .checked_mul(Decimal::from(line.amount))
        .ok_or_else(|| {
            SettlementError::invalid(format!("products[{}].amount", index), "value is out of range")
        })?;
    if sum_without_tax != line.sum_without_tax {
        return Err(SettlementError::InvalidSumWithoutTax {
            line: index,
            expected: sum_without_tax,
            submitted: line.sum_without_tax,
        });
    }

    if line.tax < Decimal::ZERO || line.tax > Decimal::ONE_HUNDRED {
        return Err(SettlementError::InvalidTax {
            line: index,
            tax: line.tax,
        });
    }

    let total_sum = (Decimal::ONE + line.tax / Decimal::ONE_HUNDRED)
        .checked_mul(sum_without_tax)
        .ok_or_else(|| {
            SettlementError::invalid(format!("products[{}].total_sum", index), "value is out of range")
        })?;
    if !within_tolerance(total_sum, line.total_sum) {
        return Err(SettlementError::InvalidTotalSum {
            line: index,
            expected: total_sum,
            submitted: line.total_sum,
        });
    }

    Ok(line.total_sum)
}

/// Check a supply document and return the header sum (sum of line totals)
pub fn validate_supply(supply: &NewSupply) -> Result<Decimal, SettlementError> {
    require_text("supplier", &supply.supplier)?;

    if supply.products.is_empty() {
        return Err(SettlementError::invalid("products", "supply has no products"));
    }
    if supply.payments.is_empty() {
        return Err(SettlementError::invalid("payments", "supply has no payments"));
    }

    let mut products_sum = Decimal::ZERO;
    for (i, line) in supply.products.iter().enumerate() {
        let total = check_supply_line(i, line)?;
        products_sum = checked_add("products", products_sum, total)?;
    }

    let mut payments_sum = Decimal::ZERO;
    for (i, payment) in supply.payments.iter().enumerate() {
        require_text(&format!("payments[{}].account", i), &payment.account)?;
        if payment.payment_sum <= Decimal::ZERO {
            return Err(SettlementError::invalid(
                format!("payments[{}].payment_sum", i),
                "payment must be positive",
            ));
        }
        payments_sum = checked_add("payments", payments_sum, payment.payment_sum)?;
    }

    if !within_tolerance(products_sum, payments_sum) {
        return Err(SettlementError::PaymentSumMismatch {
            products_sum,
            payments_sum,
        });
    }

    Ok(products_sum)
}

// ============================================================================
// Stock counts
// ============================================================================

/// Check a stock count document
pub fn validate_inventory(inventory: &NewInventory) -> Result<(), SettlementError> {
    if inventory.products.is_empty() {
        return Err(SettlementError::invalid("products", "count has no products"));
    }

    let mut seen = HashSet::new();
    for (i, counted) in inventory.products.iter().enumerate() {
        if counted.real_amount < 0 {
            return Err(SettlementError::invalid(
                format!("products[{}].real_amount", i),
                "counted amount must not be negative",
            ));
        }
        if counted.real_amount > MAX_COUNTED_AMOUNT {
            return Err(SettlementError::invalid(
                format!("products[{}].real_amount", i),
                "counted amount is out of range",
            ));
        }
        if !seen.insert(counted.product_id) {
            return Err(SettlementError::DuplicateProduct {
                product_id: counted.product_id,
            });
        }
    }

    Ok(())
}
