//! Application state.

use std::sync::Arc;

use sqlx::PgPool;

use nosh_db::{
    JobStore, PgAuditRepo, PgContentRepo, PgCreatorRepo, PgDishCatalog, PgJobStore,
    PgModerationConfigSource, PgNotificationRepo, PgOrderStore, PgSnapshotStore, PgUserRepo,
    SnapshotStore,
};
use nosh_worker::{Dispatcher, Handlers};

use crate::reconcile::Reconciler;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub reconciler: Arc<Reconciler>,
    pub webhook_secret: String,
}

impl AppState {
    /// Wire every store to PostgreSQL.
    pub fn postgres(pool: PgPool, processor_id: impl Into<String>, webhook_secret: String) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool.clone()));
        let orders = Arc::new(PgOrderStore::new(pool.clone()));
        let catalog = Arc::new(PgDishCatalog::new(pool.clone()));
        let users = Arc::new(PgUserRepo::new(pool.clone()));
        let notifications = Arc::new(PgNotificationRepo::new(pool.clone()));

        let handlers = Handlers {
            config: Arc::new(PgModerationConfigSource::new(pool.clone())),
            content: Arc::new(PgContentRepo::new(pool.clone())),
            creators: Arc::new(PgCreatorRepo::new(pool.clone())),
            notifications: notifications.clone(),
            audit: Arc::new(PgAuditRepo::new(pool)),
        };
        let dispatcher = Arc::new(Dispatcher::new(processor_id, jobs.clone(), handlers));
        let reconciler = Arc::new(Reconciler::new(
            snapshots.clone(),
            orders,
            catalog,
            users,
            notifications,
        ));

        Self {
            jobs,
            snapshots,
            dispatcher,
            reconciler,
            webhook_secret,
        }
    }
}
