//! Inventory reconciliation: physical counts reset the ledger

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    validate_inventory, InventoryVariance, NewInventory, Page, PageCursor, SettlementError,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::{Ledger, PageRequest};

/// Inventory service for stocktaking
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    config: Arc<Config>,
}

/// Stocktaking header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Inventory {
    pub id: Uuid,
    pub comment: Option<String>,
    pub created_by: Option<Uuid>,
    pub total_difference_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Per-product figures recorded by a count
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventorySnapshot {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub product_id: Uuid,
    pub initial_amount: i64,
    pub supply_amount: i64,
    pub spend_amount: i64,
    pub planned_amount: i64,
    pub real_amount: i64,
    pub unit_price: Decimal,
    pub real_amount_price: Decimal,
    pub difference: i64,
    pub difference_price: Decimal,
    pub write_off_amount: i64,
    pub write_off_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Result of a count
#[derive(Debug, Clone, Serialize)]
pub struct InventoryReport {
    #[serde(flatten)]
    pub inventory: Inventory,
    pub products: Vec<InventorySnapshot>,
}

const SNAPSHOT_COLUMNS: &str = r#"
    id, inventory_id, product_id, initial_amount, supply_amount, spend_amount,
    planned_amount, real_amount, unit_price, real_amount_price, difference,
    difference_price, write_off_amount, write_off_price, created_at
"#;

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// Record a physical count and reset each counted product's ledger to it
    pub async fn do_inventory(
        &self,
        user: &AuthUser,
        input: NewInventory,
    ) -> AppResult<InventoryReport> {
        validate_inventory(&input).map_err(|err| {
            tracing::warn!(code = err.code(), "Inventory rejected: {}", err);
            err
        })?;

        // Ascending product id keeps lock order consistent with the other paths
        let mut counted = input.products;
        counted.sort_by_key(|c| c.product_id);

        let ledger = Ledger::new(self.config.stock.allow_negative);
        let mut tx = self.db.begin().await?;

        let header = sqlx::query_as::<_, Inventory>(
            r#"
            INSERT INTO inventories (comment, created_by)
            VALUES ($1, $2)
            RETURNING id, comment, created_by, total_difference_price, created_at
            "#,
        )
        .bind(&input.comment)
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut products = Vec::with_capacity(counted.len());
        let mut total_difference_price = Decimal::ZERO;

        for count in &counted {
            let (price, before) = ledger
                .lock_counters(&mut *tx, count.product_id)
                .await?
                .ok_or(SettlementError::UnknownProduct(count.product_id))?;

            let previous_count = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT real_amount
                FROM inventory_products
                WHERE product_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#,
            )
            .bind(count.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let initial_amount =
                previous_count.unwrap_or_else(|| before.derived_initial_amount());
            let variance = InventoryVariance::compute(
                initial_amount,
                before.current_supply,
                before.current_spend,
                count.real_amount,
                price,
            )?;

            let snapshot = sqlx::query_as::<_, InventorySnapshot>(&format!(
                r#"
                INSERT INTO inventory_products
                    (inventory_id, product_id, initial_amount, supply_amount, spend_amount,
                     planned_amount, real_amount, unit_price, real_amount_price, difference,
                     difference_price, write_off_amount, write_off_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING {}
                "#,
                SNAPSHOT_COLUMNS
            ))
            .bind(header.id)
            .bind(count.product_id)
            .bind(variance.initial_amount)
            .bind(variance.supply_amount)
            .bind(variance.spend_amount)
            .bind(variance.planned_amount)
            .bind(variance.real_amount)
            .bind(variance.unit_price)
            .bind(variance.real_amount_price)
            .bind(variance.difference)
            .bind(variance.difference_price)
            .bind(variance.write_off_amount)
            .bind(variance.write_off_price)
            .fetch_one(&mut *tx)
            .await?;

            ledger
                .reset_to_count(&mut *tx, header.id, count.product_id, before, count.real_amount)
                .await?;

            total_difference_price += variance.difference_price;
            products.push(snapshot);
        }

        let inventory = sqlx::query_as::<_, Inventory>(
            r#"
            UPDATE inventories
            SET total_difference_price = $1
            WHERE id = $2
            RETURNING id, comment, created_by, total_difference_price, created_at
            "#,
        )
        .bind(total_difference_price)
        .bind(header.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            inventory_id = %inventory.id,
            products = products.len(),
            total_difference_price = %inventory.total_difference_price,
            "Inventory recorded"
        );

        Ok(InventoryReport {
            inventory,
            products,
        })
    }

    /// Counts, newest first
    pub async fn list_inventories(&self, page: PageRequest) -> AppResult<Page<Inventory>> {
        let rows = sqlx::query_as::<_, Inventory>(
            r#"
            SELECT id, comment, created_by, total_difference_price, created_at
            FROM inventories
            WHERE ($1::timestamptz IS NULL OR (created_at, id) < ($1, $2::uuid))
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(page.after_created_at())
        .bind(page.after_id())
        .bind(page.fetch_limit())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::from_overfetched(rows, page.page_size(), |i| {
            PageCursor::new(i.created_at, i.id)
        }))
    }

    /// Snapshots recorded by one count
    pub async fn get_inventory_products(
        &self,
        inventory_id: Uuid,
    ) -> AppResult<Vec<InventorySnapshot>> {
        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM inventories WHERE id = $1")
            .bind(inventory_id)
            .fetch_optional(&self.db)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Inventory".to_string()));
        }

        let snapshots = sqlx::query_as::<_, InventorySnapshot>(&format!(
            "SELECT {} FROM inventory_products WHERE inventory_id = $1 ORDER BY product_id",
            SNAPSHOT_COLUMNS
        ))
        .bind(inventory_id)
        .fetch_all(&self.db)
        .await?;

        Ok(snapshots)
    }

    /// Snapshots of one count as CSV
    pub async fn export_csv(&self, inventory_id: Uuid) -> AppResult<String> {
        let snapshots = self.get_inventory_products(inventory_id).await?;
        snapshots_to_csv(&snapshots)
    }
}

fn snapshots_to_csv<T: Serialize>(rows: &[T]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        product_id: Uuid,
        difference: i64,
        difference_price: Decimal,
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let id = Uuid::nil();
        let rows = vec![Row {
            product_id: id,
            difference: 3,
            difference_price: Decimal::new(750, 2),
        }];

        let csv = snapshots_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("product_id,difference,difference_price"));
        assert_eq!(
            lines.next(),
            Some("00000000-0000-0000-0000-000000000000,3,7.50")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_export_is_empty() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(snapshots_to_csv(&rows).unwrap(), "");
    }
}
