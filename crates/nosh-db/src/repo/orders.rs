//! Finalized order store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nosh_core::order::{CartLine, Order};
use sqlx::PgPool;

use crate::DbResult;

/// Storage for finalized per-seller orders.
///
/// `exists_for_payment` is the reconciler's idempotent short-circuit: it is
/// what makes "at most one order set per payment reference" hold under
/// duplicate webhook delivery. That only works because `create_set` is
/// all-or-nothing: a reference either has its complete order set or none of
/// it, so the short-circuit can never skip a half-written fan-out.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert every order of one payment's fan-out atomically. On failure no
    /// order is kept, leaving the reference safe to reconcile again.
    async fn create_set(&self, orders: &[Order]) -> DbResult<()>;

    async fn exists_for_payment(&self, payment_reference: &str) -> DbResult<bool>;

    /// Mark every order under this payment refunded. Returns the number of
    /// rows newly marked; marking twice is harmless and touches zero rows.
    async fn mark_refunded(&self, payment_reference: &str) -> DbResult<u64>;

    async fn list_for_payment(&self, payment_reference: &str) -> DbResult<Vec<Order>>;
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: uuid::Uuid,
    customer_id: String,
    chef_id: String,
    items: serde_json::Value,
    total_amount: i64,
    payment_reference: String,
    payment_method: String,
    nosh_points_applied: i64,
    game_debt_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> DbResult<Order> {
        let items: Vec<CartLine> = serde_json::from_value(self.items)?;
        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            chef_id: self.chef_id,
            items,
            total_amount: self.total_amount,
            payment_reference: self.payment_reference,
            payment_method: self.payment_method,
            nosh_points_applied: self.nosh_points_applied,
            game_debt_id: self.game_debt_id,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL implementation of [`OrderStore`].
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_set(&self, orders: &[Order]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for order in orders {
            sqlx::query(
                r#"
                INSERT INTO orders
                    (id, customer_id, chef_id, items, total_amount, payment_reference,
                     payment_method, nosh_points_applied, game_debt_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(order.id)
            .bind(&order.customer_id)
            .bind(&order.chef_id)
            .bind(serde_json::to_value(&order.items)?)
            .bind(order.total_amount)
            .bind(&order.payment_reference)
            .bind(&order.payment_method)
            .bind(order.nosh_points_applied)
            .bind(&order.game_debt_id)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn exists_for_payment(&self, payment_reference: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE payment_reference = $1)")
                .bind(payment_reference)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn mark_refunded(&self, payment_reference: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET refunded_at = NOW()
            WHERE payment_reference = $1 AND refunded_at IS NULL
            "#,
        )
        .bind(payment_reference)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_for_payment(&self, payment_reference: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, chef_id, items, total_amount, payment_reference,
                   payment_method, nosh_points_applied, game_debt_id, created_at
            FROM orders
            WHERE payment_reference = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(payment_reference)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(OrderRow::into_order).collect()
    }
}
