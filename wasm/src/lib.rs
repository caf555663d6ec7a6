//! WebAssembly module for the stock settlement admin panel
//!
//! Runs the same document checks as the server so forms can flag a rejected
//! supply, order or count before it is submitted. JSON in, JSON out.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{
    check_minimum_total, check_order_shape, check_supply_line, validate_inventory,
    validate_supply, InventoryVariance, NewInventory, NewOrder, NewSupply, NewSupplyProduct,
    SettlementError,
};

/// Error payload handed to JavaScript; same shape as the server's error body
#[derive(Debug, Serialize, PartialEq)]
pub struct CheckFailure {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<SettlementError> for CheckFailure {
    fn from(err: SettlementError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            field: err.field(),
        }
    }
}

impl CheckFailure {
    fn bad_input(field: &str, message: impl ToString) -> Self {
        Self {
            code: "VALIDATION_ERROR".to_string(),
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LineTotals {
    pub sum_without_tax: Decimal,
    pub total_sum: Decimal,
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, CheckFailure> {
    Decimal::from_str(raw.trim()).map_err(|e| CheckFailure::bad_input(field, e))
}

/// Validate a supply document; returns the header sum
pub fn supply_sum(supply_json: &str) -> Result<Decimal, CheckFailure> {
    let supply: NewSupply =
        serde_json::from_str(supply_json).map_err(|e| CheckFailure::bad_input("supply", e))?;
    Ok(validate_supply(&supply)?)
}

/// Amount x price, then the tax surcharge, for autofilling a supply line
pub fn supply_line_totals(
    amount: i32,
    price_for_unit: &str,
    tax: &str,
) -> Result<LineTotals, CheckFailure> {
    let price_for_unit = parse_decimal("price_for_unit", price_for_unit)?;
    let tax = parse_decimal("tax", tax)?;
    let sum_without_tax = price_for_unit
        .checked_mul(Decimal::from(amount))
        .ok_or_else(|| CheckFailure::bad_input("amount", "value is out of range"))?;
    let total_sum = (Decimal::ONE + tax / Decimal::ONE_HUNDRED)
        .checked_mul(sum_without_tax)
        .ok_or_else(|| CheckFailure::bad_input("total_sum", "value is out of range"))?;

    // Run the server's line check against what we computed
    check_supply_line(
        0,
        &NewSupplyProduct {
            product_id: Default::default(),
            amount,
            price_for_unit,
            tax,
            sum_without_tax,
            total_sum,
        },
    )?;

    Ok(LineTotals {
        sum_without_tax,
        total_sum,
    })
}

/// Checks an order can be submitted; prices are verified server-side
pub fn order_precheck(order_json: &str, min_order_total: &str) -> Result<(), CheckFailure> {
    let order: NewOrder =
        serde_json::from_str(order_json).map_err(|e| CheckFailure::bad_input("order", e))?;
    let minimum = parse_decimal("min_order_total", min_order_total)?;
    check_order_shape(&order)?;
    check_minimum_total(order.sum_price, minimum)?;
    Ok(())
}

pub fn count_precheck(inventory_json: &str) -> Result<(), CheckFailure> {
    let inventory: NewInventory = serde_json::from_str(inventory_json)
        .map_err(|e| CheckFailure::bad_input("inventory", e))?;
    Ok(validate_inventory(&inventory)?)
}

/// Expected variance for one counted product
pub fn count_variance(
    initial_amount: i64,
    supply_amount: i64,
    spend_amount: i64,
    real_amount: i64,
    unit_price: &str,
) -> Result<InventoryVariance, CheckFailure> {
    let unit_price = parse_decimal("unit_price", unit_price)?;
    Ok(InventoryVariance::compute(
        initial_amount,
        supply_amount,
        spend_amount,
        real_amount,
        unit_price,
    )?)
}

fn to_js<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn reject(failure: CheckFailure) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&failure.message));
    let err = js_sys::Error::new(&failure.message);
    err.set_name(&failure.code);
    if let Some(field) = &failure.field {
        // Best effort: a frozen Error object just loses the field
        let _ = js_sys::Reflect::set(&err, &JsValue::from_str("field"), &JsValue::from_str(field));
    }
    err.into()
}

/// Validate a supply; resolves to the header sum as a decimal string
#[wasm_bindgen(js_name = validateSupply)]
pub fn validate_supply_js(supply_json: &str) -> Result<String, JsValue> {
    supply_sum(supply_json).map(|sum| sum.to_string()).map_err(reject)
}

#[wasm_bindgen(js_name = supplyLineTotals)]
pub fn supply_line_totals_js(amount: i32, price_for_unit: &str, tax: &str) -> Result<String, JsValue> {
    let totals = supply_line_totals(amount, price_for_unit, tax).map_err(reject)?;
    to_js(&totals)
}

#[wasm_bindgen(js_name = precheckOrder)]
pub fn order_precheck_js(order_json: &str, min_order_total: &str) -> Result<(), JsValue> {
    order_precheck(order_json, min_order_total).map_err(reject)
}

#[wasm_bindgen(js_name = precheckCount)]
pub fn count_precheck_js(inventory_json: &str) -> Result<(), JsValue> {
    count_precheck(inventory_json).map_err(reject)
}

#[wasm_bindgen(js_name = countVariance)]
pub fn count_variance_js(
    initial_amount: i64,
    supply_amount: i64,
    spend_amount: i64,
    real_amount: i64,
    unit_price: &str,
) -> Result<String, JsValue> {
    let variance = count_variance(
        initial_amount,
        supply_amount,
        spend_amount,
        real_amount,
        unit_price,
    )
    .map_err(reject)?;
    to_js(&variance)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT: &str = "7d3c1c1e-2f4a-4b8e-9f51-0c6a9d1e2b3f";

    fn supply_json(total_sum: &str, payment: &str) -> String {
        format!(
            r#"{{
                "supplier": "Acme",
                "supply_time": "2024-03-01T10:00:00Z",
                "comment": null,
                "payments": [{{"account": "main", "payment_sum": "{payment}"}}],
                "products": [{{
                    "product_id": "{PRODUCT}",
                    "amount": 100,
                    "price_for_unit": "2.00",
                    "tax": "20",
                    "sum_without_tax": "200.00",
                    "total_sum": "{total_sum}"
                }}]
            }}"#
        )
    }

    #[test]
    fn test_supply_sum_matches_server() {
        let sum = supply_sum(&supply_json("240.00", "240.00")).unwrap();
        assert_eq!(sum, Decimal::new(240, 0));
    }

    #[test]
    fn test_supply_total_off_by_a_cent_is_flagged() {
        let failure = supply_sum(&supply_json("239.99", "239.99")).unwrap_err();
        assert_eq!(failure.code, "INVALID_TOTAL_SUM");
        assert_eq!(failure.field.as_deref(), Some("products[0].total_sum"));
    }

    #[test]
    fn test_malformed_json_is_a_validation_failure() {
        let failure = supply_sum("{").unwrap_err();
        assert_eq!(failure.code, "VALIDATION_ERROR");
        assert_eq!(failure.field.as_deref(), Some("supply"));
    }

    #[test]
    fn test_line_totals() {
        let totals = supply_line_totals(100, "2.00", "20").unwrap();
        assert_eq!(totals.sum_without_tax, Decimal::new(200, 0));
        assert_eq!(totals.total_sum, Decimal::new(240, 0));
    }

    #[test]
    fn test_line_totals_rejects_bad_tax() {
        let failure = supply_line_totals(1, "1", "150").unwrap_err();
        assert_eq!(failure.code, "INVALID_TAX");
    }

    #[test]
    fn test_count_variance() {
        let v = count_variance(10, 5, 3, 9, "2.50").unwrap();
        assert_eq!(v.planned_amount, 12);
        assert_eq!(v.write_off_amount, 3);
    }

    #[test]
    fn test_line_totals_overflow_is_a_validation_failure() {
        let failure = supply_line_totals(2, "79228162514264337593543950335", "0").unwrap_err();
        assert_eq!(failure.code, "VALIDATION_ERROR");
        assert_eq!(failure.field.as_deref(), Some("amount"));
    }

    #[test]
    fn test_count_variance_overflow_is_a_validation_failure() {
        let failure = count_variance(0, 0, 2, i64::MAX, "1").unwrap_err();
        assert_eq!(failure.code, "VALIDATION_ERROR");
        assert_eq!(failure.field.as_deref(), Some("real_amount"));
    }
}
