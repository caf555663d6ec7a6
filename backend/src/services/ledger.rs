//! Ledger store: the only code that changes a product's stock counters
//!
//! Relative changes are single `column = column + $n` statements evaluated by
//! PostgreSQL against the current row, so concurrent transactions never lose
//! each other's updates. The absolute write done at stocktaking happens only
//! on a row locked with `FOR UPDATE` in the same transaction.

use rust_decimal::Decimal;
use shared::{CounterDelta, LedgerCounters, StockDelta, StockMovementKind};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub(crate) const ADJUST_STOCK_SQL: &str = r#"
    UPDATE products
    SET amount_in_stock = amount_in_stock + $1,
        current_supply = current_supply + $2,
        current_spend = current_spend + $3,
        updated_at = NOW()
    WHERE id = $4
      AND ($5 OR $1 >= 0 OR amount_in_stock + $1 >= 0)
"#;

pub(crate) const RESET_TO_COUNT_SQL: &str = r#"
    UPDATE products
    SET amount_in_stock = $1,
        current_supply = 0,
        current_spend = 0,
        current_write_off = 0,
        last_inventory = NOW(),
        updated_at = NOW()
    WHERE id = $2
"#;

// NO KEY UPDATE: blocks other ledger writers but not the FOR KEY SHARE lock
// taken by inserts of rows referencing the product
pub(crate) const LOCK_COUNTERS_SQL: &str = r#"
    SELECT price, amount_in_stock, current_supply, current_spend, current_write_off
    FROM products
    WHERE id = $1
    FOR NO KEY UPDATE
"#;

/// Ledger row locked for the rest of the transaction
#[derive(Debug, sqlx::FromRow)]
struct LockedRow {
    price: Decimal,
    amount_in_stock: i64,
    current_supply: i64,
    current_spend: i64,
    current_write_off: i64,
}

/// Applies stock movements inside a caller-owned transaction
#[derive(Clone, Copy, Debug)]
pub struct Ledger {
    allow_negative: bool,
}

impl Ledger {
    pub fn new(allow_negative: bool) -> Self {
        Self { allow_negative }
    }

    /// Apply one movement per delta, in the given (product id) order, and
    /// journal each of them.
    pub async fn apply(
        &self,
        conn: &mut PgConnection,
        kind: StockMovementKind,
        source_id: Uuid,
        deltas: &[StockDelta],
    ) -> AppResult<()> {
        for delta in deltas {
            let change = kind.counter_delta(delta.quantity);

            let result = sqlx::query(ADJUST_STOCK_SQL)
                .bind(change.stock)
                .bind(change.supply)
                .bind(change.spend)
                .bind(delta.product_id)
                .bind(self.allow_negative)
                .execute(&mut *conn)
                .await?;

            if result.rows_affected() == 0 {
                return Err(Self::explain_rejection(conn, kind, source_id, delta, change).await);
            }

            record_movement(conn, delta.product_id, kind, change.stock, source_id).await?;
        }

        Ok(())
    }

    /// A guarded update matched nothing: either the floor held or the row is gone
    async fn explain_rejection(
        conn: &mut PgConnection,
        kind: StockMovementKind,
        source_id: Uuid,
        delta: &StockDelta,
        change: CounterDelta,
    ) -> AppError {
        let available = sqlx::query_scalar::<_, i64>(
            "SELECT amount_in_stock FROM products WHERE id = $1",
        )
        .bind(delta.product_id)
        .fetch_optional(&mut *conn)
        .await;

        match available {
            Ok(Some(available)) => AppError::InsufficientStock {
                product_id: delta.product_id,
                available,
                requested: -change.stock,
            },
            Ok(None) => {
                tracing::error!(
                    product_id = %delta.product_id,
                    source_id = %source_id,
                    kind = %kind,
                    quantity = delta.quantity,
                    "Stock movement matched no ledger row"
                );
                AppError::LedgerInconsistency(format!(
                    "{} for {} references missing product {}",
                    kind, source_id, delta.product_id
                ))
            }
            Err(err) => err.into(),
        }
    }

    /// Lock a product's ledger row and return its price and counters
    pub async fn lock_counters(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> AppResult<Option<(Decimal, LedgerCounters)>> {
        let row = sqlx::query_as::<_, LockedRow>(LOCK_COUNTERS_SQL)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| {
            (
                r.price,
                LedgerCounters {
                    amount_in_stock: r.amount_in_stock,
                    current_supply: r.current_supply,
                    current_spend: r.current_spend,
                    current_write_off: r.current_write_off,
                },
            )
        }))
    }

    /// Replace the counters with a physical count. The row must already be
    /// locked by [`Ledger::lock_counters`] in the same transaction.
    pub async fn reset_to_count(
        &self,
        conn: &mut PgConnection,
        inventory_id: Uuid,
        product_id: Uuid,
        before: LedgerCounters,
        real_amount: i64,
    ) -> AppResult<()> {
        let result = sqlx::query(RESET_TO_COUNT_SQL)
            .bind(real_amount)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::LedgerInconsistency(format!(
                "count {} lost the lock on product {}",
                inventory_id, product_id
            )));
        }

        let correction = real_amount - before.amount_in_stock;
        if correction != 0 {
            record_movement(
                conn,
                product_id,
                StockMovementKind::InventoryCorrection,
                correction,
                inventory_id,
            )
            .await?;
        }

        Ok(())
    }
}

async fn record_movement(
    conn: &mut PgConnection,
    product_id: Uuid,
    kind: StockMovementKind,
    delta: i64,
    source_id: Uuid,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (product_id, kind, delta, source_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(product_id)
    .bind(kind.as_str())
    .bind(delta)
    .bind(source_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
