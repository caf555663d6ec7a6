//! Order settlement: checkout, status transitions and order reads

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    check_minimum_total, check_order_shape, plan_stock_deltas, validate_order_prices, NewOrder,
    OrderStatus, Page, PageCursor, StockMovementKind,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::{CatalogService, Ledger, PageRequest};

/// Order service for checkout and order processing
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    config: Arc<Config>,
}

/// Result of a successful checkout
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CreatedOrder {
    pub id: Uuid,
    pub status: String,
    pub sum_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Order header as listed for administrators
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderSummary {
    pub id: Uuid,
    pub status: String,
    pub sum_price: Decimal,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
    pub delivery_type: String,
    pub payment_type: String,
    pub line_count: i64,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_for_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderDelivery {
    pub id: Uuid,
    pub address: String,
    pub delivery_time: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

/// Order with its lines
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub comment: Option<String>,
    pub lines: Vec<OrderLine>,
    pub deliveries: Vec<OrderDelivery>,
}

const SUMMARY_COLUMNS: &str = r#"
    o.id, o.status, o.sum_price, o.first_name, o.last_name, o.phone, o.email,
    o.user_id, dt.title AS delivery_type, pt.title AS payment_type,
    (SELECT COUNT(*) FROM order_lines ol WHERE ol.order_id = o.id) AS line_count,
    o.created_at, o.processed_at, o.completed_at
"#;

const SUMMARY_FROM: &str = r#"
    FROM orders o
    JOIN delivery_types dt ON dt.id = o.delivery_type_id
    JOIN payment_types pt ON pt.id = o.payment_type_id
"#;

fn summary_select() -> String {
    format!("SELECT {} {}", SUMMARY_COLUMNS, SUMMARY_FROM)
}

/// Header and comment of one order in a single statement
fn detail_select() -> String {
    format!(
        "SELECT {}, o.comment {} WHERE o.id = $1",
        SUMMARY_COLUMNS, SUMMARY_FROM
    )
}

/// Summary columns plus the fields only the detail view shows
#[derive(Debug, FromRow)]
struct OrderDetailRow {
    #[sqlx(flatten)]
    order: OrderSummary,
    comment: Option<String>,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    fn ledger(&self) -> Ledger {
        Ledger::new(self.config.stock.allow_negative)
    }

    /// Validate a checkout against authoritative prices and persist it
    pub async fn create_order(
        &self,
        user: Option<&AuthUser>,
        input: NewOrder,
    ) -> AppResult<CreatedOrder> {
        // Shape and minimum total are checked before any database access
        check_order_shape(&input)?;
        check_minimum_total(input.sum_price, self.config.checkout.min_order_total)?;

        let unit_prices = CatalogService::new(self.db.clone())
            .unit_prices(&input.product_ids())
            .await?;
        validate_order_prices(&input, &unit_prices).map_err(|err| {
            tracing::warn!(code = err.code(), "Order rejected: {}", err);
            err
        })?;

        let mut tx = self.db.begin().await?;

        let delivery_type_id =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM delivery_types WHERE title = $1")
                .bind(&input.delivery_type)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::UnknownDeliveryType(input.delivery_type.clone()))?;

        let payment_type_id =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM payment_types WHERE title = $1")
                .bind(&input.payment_type)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::UnknownPaymentType(input.payment_type.clone()))?;

        let order = sqlx::query_as::<_, CreatedOrder>(
            r#"
            INSERT INTO orders (status, sum_price, first_name, last_name, phone, email, comment,
                                delivery_type_id, payment_type_id, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, status, sum_price, created_at
            "#,
        )
        .bind(OrderStatus::InProgress.as_str())
        .bind(input.sum_price)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.comment)
        .bind(delivery_type_id)
        .bind(payment_type_id)
        .bind(user.map(|u| u.user_id))
        .fetch_one(&mut *tx)
        .await?;

        for (position, line) in input.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, product_id, quantity, price_for_quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.price_for_quantity)
            .execute(&mut *tx)
            .await?;
        }

        for delivery in &input.deliveries {
            sqlx::query(
                r#"
                INSERT INTO order_deliveries (order_id, address, delivery_time, comment)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id)
            .bind(&delivery.address)
            .bind(delivery.delivery_time)
            .bind(&delivery.comment)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(user) = user {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                .bind(user.user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            lines = input.lines.len(),
            sum_price = %order.sum_price,
            "Order created"
        );

        Ok(order)
    }

    /// IN_PROGRESS -> PROCESSED; stock leaves the ledger here
    pub async fn process_order(&self, order_id: Uuid) -> AppResult<OrderDetail> {
        self.transition(order_id, OrderStatus::Processed).await
    }

    /// PROCESSED -> COMPLETED
    pub async fn complete_order(&self, order_id: Uuid) -> AppResult<OrderDetail> {
        self.transition(order_id, OrderStatus::Completed).await
    }

    async fn transition(&self, order_id: Uuid, next: OrderStatus) -> AppResult<OrderDetail> {
        let mut tx = self.db.begin().await?;

        // Row lock: a second transition of the same order waits here
        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let current: OrderStatus = current.parse().map_err(AppError::Internal)?;
        if !current.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition(format!(
                "order {} cannot move from {} to {}",
                order_id, current, next
            )));
        }

        if current.decrements_stock_on(next) {
            let lines = sqlx::query_as::<_, (Uuid, i32)>(
                "SELECT product_id, quantity FROM order_lines WHERE order_id = $1",
            )
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

            let deltas = plan_stock_deltas(
                lines
                    .into_iter()
                    .map(|(product_id, quantity)| (product_id, i64::from(quantity))),
            );
            self.ledger()
                .apply(&mut *tx, StockMovementKind::OrderSpend, order_id, &deltas)
                .await?;
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $1,
                processed_at = CASE WHEN $1 = 'PROCESSED' THEN NOW() ELSE processed_at END,
                completed_at = CASE WHEN $1 = 'COMPLETED' THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(next.as_str())
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order_id, from = %current, to = %next, "Order status changed");

        self.get_order(order_id).await
    }

    /// Orders for the admin panel, optionally filtered by status
    pub async fn list_admin_orders(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> AppResult<Page<OrderSummary>> {
        let sql = format!(
            r#"{}
            WHERE ($1::text IS NULL OR o.status = $1)
              AND ($2::timestamptz IS NULL OR (o.created_at, o.id) < ($2, $3::uuid))
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $4
            "#,
            summary_select()
        );

        let rows = sqlx::query_as::<_, OrderSummary>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(page.after_created_at())
            .bind(page.after_id())
            .bind(page.fetch_limit())
            .fetch_all(&self.db)
            .await?;

        Ok(Page::from_overfetched(rows, page.page_size(), |o| {
            PageCursor::new(o.created_at, o.id)
        }))
    }

    /// Orders placed by one customer
    pub async fn list_user_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<OrderSummary>> {
        let sql = format!(
            r#"{}
            WHERE o.user_id = $1
              AND ($2::timestamptz IS NULL OR (o.created_at, o.id) < ($2, $3::uuid))
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $4
            "#,
            summary_select()
        );

        let rows = sqlx::query_as::<_, OrderSummary>(&sql)
            .bind(user_id)
            .bind(page.after_created_at())
            .bind(page.after_id())
            .bind(page.fetch_limit())
            .fetch_all(&self.db)
            .await?;

        Ok(Page::from_overfetched(rows, page.page_size(), |o| {
            PageCursor::new(o.created_at, o.id)
        }))
    }

    /// Order with lines and deliveries
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderDetail> {
        let OrderDetailRow { order, comment } =
            sqlx::query_as::<_, OrderDetailRow>(&detail_select())
                .bind(order_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT id, product_id, quantity, price_for_quantity
            FROM order_lines
            WHERE order_id = $1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        let deliveries = sqlx::query_as::<_, OrderDelivery>(
            r#"
            SELECT id, address, delivery_time, comment
            FROM order_deliveries
            WHERE order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(OrderDetail {
            order,
            comment,
            lines,
            deliveries,
        })
    }
}
