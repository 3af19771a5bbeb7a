//! Pending-order snapshot store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nosh_core::order::{CartLine, PendingOrder};
use sqlx::PgPool;

use crate::DbResult;

/// Storage for checkout snapshots, keyed by the external payment reference.
///
/// Exactly one live snapshot exists per reference; `save` replaces any
/// earlier snapshot for the same reference.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &PendingOrder) -> DbResult<()>;
    async fn get(&self, payment_reference: &str) -> DbResult<Option<PendingOrder>>;
    async fn remove(&self, payment_reference: &str) -> DbResult<()>;
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    payment_reference: String,
    user_id: String,
    items: serde_json::Value,
    delivery_address: Option<String>,
    special_instructions: Option<String>,
    nosh_points_applied: Option<i64>,
    game_debt_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> DbResult<PendingOrder> {
        let items: Vec<CartLine> = serde_json::from_value(self.items)?;
        Ok(PendingOrder {
            payment_reference: self.payment_reference,
            user_id: self.user_id,
            items,
            delivery_address: self.delivery_address,
            special_instructions: self.special_instructions,
            nosh_points_applied: self.nosh_points_applied,
            game_debt_id: self.game_debt_id,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL implementation of [`SnapshotStore`].
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn save(&self, snapshot: &PendingOrder) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pending_orders
                (payment_reference, user_id, items, delivery_address,
                 special_instructions, nosh_points_applied, game_debt_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (payment_reference) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                items = EXCLUDED.items,
                delivery_address = EXCLUDED.delivery_address,
                special_instructions = EXCLUDED.special_instructions,
                nosh_points_applied = EXCLUDED.nosh_points_applied,
                game_debt_id = EXCLUDED.game_debt_id,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&snapshot.payment_reference)
        .bind(&snapshot.user_id)
        .bind(serde_json::to_value(&snapshot.items)?)
        .bind(&snapshot.delivery_address)
        .bind(&snapshot.special_instructions)
        .bind(snapshot.nosh_points_applied)
        .bind(&snapshot.game_debt_id)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, payment_reference: &str) -> DbResult<Option<PendingOrder>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT * FROM pending_orders WHERE payment_reference = $1",
        )
        .bind(payment_reference)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SnapshotRow::into_snapshot).transpose()
    }

    async fn remove(&self, payment_reference: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM pending_orders WHERE payment_reference = $1")
            .bind(payment_reference)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
