//! Errors raised by the settlement rules

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Broad class of a settlement failure, used to pick the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad shape, missing field or out-of-range value
    Validation,
    /// Totals or prices that do not add up
    Consistency,
    /// A referenced record does not exist
    NotFound,
}

/// A document was rejected before anything was written
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("order total {submitted} is below the minimum of {minimum}")]
    BelowMinimumTotal { submitted: Decimal, minimum: Decimal },

    #[error("product {0} does not exist")]
    UnknownProduct(Uuid),

    #[error("product {product_id} appears more than once")]
    DuplicateProduct { product_id: Uuid },

    #[error(
        "line {line}: {submitted} for {quantity} units does not match unit price {unit_price}"
    )]
    PriceMismatch {
        line: usize,
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
        submitted: Decimal,
    },

    #[error("order sum {submitted} does not match the computed sum {computed}")]
    SumMismatch { computed: Decimal, submitted: Decimal },

    #[error("line {line}: sum without tax {submitted} does not match {expected}")]
    InvalidSumWithoutTax {
        line: usize,
        expected: Decimal,
        submitted: Decimal,
    },

    #[error("line {line}: tax {tax} must be between 0 and 100")]
    InvalidTax { line: usize, tax: Decimal },

    #[error("line {line}: total sum {submitted} does not match {expected}")]
    InvalidTotalSum {
        line: usize,
        expected: Decimal,
        submitted: Decimal,
    },

    #[error("products sum {products_sum} does not match payments sum {payments_sum}")]
    PaymentSumMismatch {
        products_sum: Decimal,
        payments_sum: Decimal,
    },
}

impl SettlementError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        SettlementError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::InvalidField { .. }
            | SettlementError::BelowMinimumTotal { .. }
            | SettlementError::DuplicateProduct { .. }
            | SettlementError::InvalidTax { .. } => ErrorKind::Validation,
            SettlementError::UnknownProduct(_) => ErrorKind::NotFound,
            SettlementError::PriceMismatch { .. }
            | SettlementError::SumMismatch { .. }
            | SettlementError::InvalidSumWithoutTax { .. }
            | SettlementError::InvalidTotalSum { .. }
            | SettlementError::PaymentSumMismatch { .. } => ErrorKind::Consistency,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::InvalidField { .. } => "VALIDATION_ERROR",
            SettlementError::BelowMinimumTotal { .. } => "BELOW_MINIMUM_TOTAL",
            SettlementError::UnknownProduct(_) => "UNKNOWN_PRODUCT",
            SettlementError::DuplicateProduct { .. } => "DUPLICATE_PRODUCT",
            SettlementError::PriceMismatch { .. } => "PRICE_MISMATCH",
            SettlementError::SumMismatch { .. } => "SUM_MISMATCH",
            SettlementError::InvalidSumWithoutTax { .. } => "INVALID_SUM_WITHOUT_TAX",
            SettlementError::InvalidTax { .. } => "INVALID_TAX",
            SettlementError::InvalidTotalSum { .. } => "INVALID_TOTAL_SUM",
            SettlementError::PaymentSumMismatch { .. } => "PAYMENT_SUM_MISMATCH",
        }
    }

    /// Field path the error refers to, when there is one
    pub fn field(&self) -> Option<String> {
        match self {
            SettlementError::InvalidField { field, .. } => Some(field.clone()),
            SettlementError::BelowMinimumTotal { .. } | SettlementError::SumMismatch { .. } => {
                Some("sum_price".to_string())
            }
            SettlementError::PriceMismatch { line, .. } => {
                Some(format!("lines[{}].price_for_quantity", line))
            }
            SettlementError::InvalidSumWithoutTax { line, .. } => {
                Some(format!("products[{}].sum_without_tax", line))
            }
            SettlementError::InvalidTax { line, .. } => Some(format!("products[{}].tax", line)),
            SettlementError::InvalidTotalSum { line, .. } => {
                Some(format!("products[{}].total_sum", line))
            }
            SettlementError::PaymentSumMismatch { .. } => Some("payments".to_string()),
            SettlementError::UnknownProduct(_) | SettlementError::DuplicateProduct { .. } => None,
        }
    }
}
