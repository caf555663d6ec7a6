//! Supply intake: supplier deliveries, their payments and stock effect

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    plan_stock_deltas, validate_supply, NewSupply, Page, PageCursor, SettlementError,
    StockMovementKind,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::{CatalogService, Ledger, PageRequest};

/// Supply service for stock intake and reversal
#[derive(Clone)]
pub struct SupplyService {
    db: PgPool,
    config: Arc<Config>,
}

/// Supply header as listed
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplyInfo {
    pub id: Uuid,
    pub supplier: String,
    pub supply_time: DateTime<Utc>,
    pub comment: Option<String>,
    pub sum: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplyPayment {
    pub id: Uuid,
    pub account: String,
    pub payment_sum: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplyProduct {
    pub id: Uuid,
    pub product_id: Uuid,
    pub amount: i32,
    pub price_for_unit: Decimal,
    pub tax: Decimal,
    pub sum_without_tax: Decimal,
    pub total_sum: Decimal,
}

/// Supply with payments and product lines
#[derive(Debug, Clone, Serialize)]
pub struct SupplyDetail {
    #[serde(flatten)]
    pub supply: SupplyInfo,
    pub payments: Vec<SupplyPayment>,
    pub products: Vec<SupplyProduct>,
}

impl SupplyService {
    /// Create a new SupplyService instance
    pub fn new(db: PgPool, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    fn ledger(&self) -> Ledger {
        Ledger::new(self.config.stock.allow_negative)
    }

    /// Record a supplier delivery and add its amounts to stock
    pub async fn create_supply(&self, user: &AuthUser, input: NewSupply) -> AppResult<SupplyDetail> {
        let products_sum = validate_supply(&input).map_err(|err| {
            tracing::warn!(code = err.code(), supplier = %input.supplier, "Supply rejected: {}", err);
            err
        })?;

        let mut product_ids: Vec<Uuid> = input.products.iter().map(|p| p.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let known = CatalogService::new(self.db.clone())
            .unit_prices(&product_ids)
            .await?;
        if let Some(missing) = product_ids.iter().find(|id| !known.contains_key(*id)) {
            return Err(SettlementError::UnknownProduct(*missing).into());
        }

        let mut tx = self.db.begin().await?;

        let supply = sqlx::query_as::<_, SupplyInfo>(
            r#"
            INSERT INTO supplies (supplier, supply_time, comment, sum, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, supplier, supply_time, comment, sum, created_by, created_at
            "#,
        )
        .bind(&input.supplier)
        .bind(input.supply_time)
        .bind(&input.comment)
        .bind(products_sum)
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut payments = Vec::with_capacity(input.payments.len());
        for payment in &input.payments {
            let row = sqlx::query_as::<_, SupplyPayment>(
                r#"
                INSERT INTO supply_payments (supply_id, account, payment_sum)
                VALUES ($1, $2, $3)
                RETURNING id, account, payment_sum
                "#,
            )
            .bind(supply.id)
            .bind(&payment.account)
            .bind(payment.payment_sum)
            .fetch_one(&mut *tx)
            .await?;
            payments.push(row);
        }

        let mut products = Vec::with_capacity(input.products.len());
        for line in &input.products {
            let row = sqlx::query_as::<_, SupplyProduct>(
                r#"
                INSERT INTO supply_products
                    (supply_id, product_id, amount, price_for_unit, tax, sum_without_tax, total_sum)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, product_id, amount, price_for_unit, tax, sum_without_tax, total_sum
                "#,
            )
            .bind(supply.id)
            .bind(line.product_id)
            .bind(line.amount)
            .bind(line.price_for_unit)
            .bind(line.tax)
            .bind(line.sum_without_tax)
            .bind(line.total_sum)
            .fetch_one(&mut *tx)
            .await?;
            products.push(row);
        }

        let deltas = plan_stock_deltas(
            input
                .products
                .iter()
                .map(|p| (p.product_id, i64::from(p.amount))),
        );
        self.ledger()
            .apply(&mut *tx, StockMovementKind::Supply, supply.id, &deltas)
            .await?;

        tx.commit().await?;

        tracing::info!(
            supply_id = %supply.id,
            products = products.len(),
            sum = %supply.sum,
            "Supply recorded"
        );

        Ok(SupplyDetail {
            supply,
            payments,
            products,
        })
    }

    /// Delete a supply and take its amounts back out of stock
    pub async fn delete_supply(&self, supply_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM supplies WHERE id = $1 FOR UPDATE",
        )
        .bind(supply_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Supply".to_string()));
        }

        let lines = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT product_id, amount FROM supply_products WHERE supply_id = $1",
        )
        .bind(supply_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM supplies WHERE id = $1")
            .bind(supply_id)
            .execute(&mut *tx)
            .await?;

        let deltas = plan_stock_deltas(
            lines
                .into_iter()
                .map(|(product_id, amount)| (product_id, i64::from(amount))),
        );
        self.ledger()
            .apply(&mut *tx, StockMovementKind::SupplyReversal, supply_id, &deltas)
            .await?;

        tx.commit().await?;

        tracing::info!(supply_id = %supply_id, products = deltas.len(), "Supply deleted");

        Ok(())
    }

    /// Supplies, newest first
    pub async fn list_supplies(&self, page: PageRequest) -> AppResult<Page<SupplyInfo>> {
        let rows = sqlx::query_as::<_, SupplyInfo>(
            r#"
            SELECT id, supplier, supply_time, comment, sum, created_by, created_at
            FROM supplies
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

        Ok(Page::from_overfetched(rows, page.page_size(), |s| {
            PageCursor::new(s.created_at, s.id)
        }))
    }

    pub async fn get_supply(&self, supply_id: Uuid) -> AppResult<SupplyDetail> {
        let supply = sqlx::query_as::<_, SupplyInfo>(
            r#"
            SELECT id, supplier, supply_time, comment, sum, created_by, created_at
            FROM supplies
            WHERE id = $1
            "#,
        )
        .bind(supply_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supply".to_string()))?;

        let payments = sqlx::query_as::<_, SupplyPayment>(
            "SELECT id, account, payment_sum FROM supply_payments WHERE supply_id = $1 ORDER BY created_at, id",
        )
        .bind(supply_id)
        .fetch_all(&self.db)
        .await?;

        let products = sqlx::query_as::<_, SupplyProduct>(
            r#"
            SELECT id, product_id, amount, price_for_unit, tax, sum_without_tax, total_sum
            FROM supply_products
            WHERE supply_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(supply_id)
        .fetch_all(&self.db)
        .await?;

        Ok(SupplyDetail {
            supply,
            payments,
            products,
        })
    }
}
