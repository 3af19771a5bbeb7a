//! Repository traits and PostgreSQL implementations.

pub mod jobs;
pub mod marketplace;
pub mod moderation;
pub mod notify;
pub mod orders;
pub mod snapshots;

pub use jobs::{Job, JobStore, PgJobStore};
pub use marketplace::{DishCatalog, PgDishCatalog, PgUserRepo, UserRepo};
pub use moderation::{
    ContentRepo, CreatorRepo, ModerationConfigSource, PgContentRepo, PgCreatorRepo,
    PgModerationConfigSource,
};
pub use notify::{AuditRepo, NotificationRepo, PgAuditRepo, PgNotificationRepo};
pub use orders::{OrderStore, PgOrderStore};
pub use snapshots::{PgSnapshotStore, SnapshotStore};
