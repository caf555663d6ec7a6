//! Catalog reads: authoritative prices, ledger rows and the movement journal

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Page, PageCursor};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::PageRequest;

/// Price oracle and ledger read access
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Ledger row of a product
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductStock {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub amount_in_stock: i64,
    pub current_supply: i64,
    pub current_spend: i64,
    pub current_write_off: i64,
    pub last_inventory: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Authoritative unit price of a product
#[derive(Debug, Clone, Serialize)]
pub struct UnitPrice {
    pub product_id: Uuid,
    pub price: Decimal,
}

/// Journal entry for one stock change
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub kind: String,
    pub delta: i64,
    pub source_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Authoritative unit price of one product
    pub async fn unit_price(&self, product_id: Uuid) -> AppResult<UnitPrice> {
        let price = sqlx::query_scalar::<_, Decimal>("SELECT price FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(UnitPrice { product_id, price })
    }

    /// Unit prices for a set of products; unknown ids are simply absent
    pub async fn unit_prices(&self, product_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Decimal>> {
        let rows = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT id, price FROM products WHERE id = ANY($1)",
        )
        .bind(product_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Current ledger row
    pub async fn get_stock(&self, product_id: Uuid) -> AppResult<ProductStock> {
        sqlx::query_as::<_, ProductStock>(
            r#"
            SELECT id, title, price, amount_in_stock, current_supply, current_spend,
                   current_write_off, last_inventory, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Stock movements of a product, newest first
    pub async fn list_movements(
        &self,
        product_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<StockMovement>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, kind, delta, source_id, created_at
            FROM stock_movements
            WHERE product_id = $1
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3::uuid))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(product_id)
        .bind(page.after_created_at())
        .bind(page.after_id())
        .bind(page.fetch_limit())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::from_overfetched(rows, page.page_size(), |m| {
            PageCursor::new(m.created_at, m.id)
        }))
    }
}
