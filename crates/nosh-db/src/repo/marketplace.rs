//! Marketplace collaborators the reconciler leans on: the dish catalog and
//! the user record (cart, subscription, balance ledger).

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbResult;

/// Resolves which seller owns a dish.
#[async_trait]
pub trait DishCatalog: Send + Sync {
    async fn chef_for_dish(&self, dish_id: &str) -> DbResult<Option<String>>;
}

/// User-record mutations driven by payment events.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Best-effort cleanup after reconciliation; callers treat failure as
    /// non-fatal.
    async fn clear_cart(&self, user_id: &str) -> DbResult<()>;

    async fn set_subscription(&self, user_id: &str, active: bool) -> DbResult<()>;

    /// Credit a balance top-up to the user's ledger. `reference` is the
    /// payment id; crediting the same reference twice is a no-op.
    async fn credit_balance(
        &self,
        user_id: &str,
        amount: i64,
        currency: &str,
        reference: &str,
    ) -> DbResult<()>;
}

/// PostgreSQL implementation of [`DishCatalog`].
pub struct PgDishCatalog {
    pool: PgPool,
}

impl PgDishCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DishCatalog for PgDishCatalog {
    async fn chef_for_dish(&self, dish_id: &str) -> DbResult<Option<String>> {
        let chef_id: Option<String> =
            sqlx::query_scalar("SELECT chef_id FROM dishes WHERE id = $1")
                .bind(dish_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(chef_id)
    }
}

/// PostgreSQL implementation of [`UserRepo`].
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn clear_cart(&self, user_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET cart = '[]'::jsonb, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_subscription(&self, user_id: &str, active: bool) -> DbResult<()> {
        let status = if active { "active" } else { "inactive" };
        sqlx::query("UPDATE users SET subscription_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn credit_balance(
        &self,
        user_id: &str,
        amount: i64,
        currency: &str,
        reference: &str,
    ) -> DbResult<()> {
        // Unique reference makes webhook redelivery harmless.
        sqlx::query(
            r#"
            INSERT INTO balance_transactions
                (id, user_id, kind, amount, currency, reference, created_at)
            VALUES ($1, $2, 'credit', $3, $4, $5, NOW())
            ON CONFLICT (reference) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(amount)
        .bind(currency)
        .bind(reference)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
