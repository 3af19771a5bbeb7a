//! In-memory store implementations.
//!
//! Used by tests across the workspace and by local development without a
//! database. The job store reproduces the lease semantics of the PostgreSQL
//! implementation exactly: a single mutex serializes claims, and
//! complete/fail are fenced by the lock issued at claim time.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use nosh_core::JobPayload;
use nosh_core::job::{ContentType, ReportSeverity};
use nosh_core::moderation::{ModerationConfig, NotifyPriority};
use nosh_core::order::{Order, PendingOrder};

use crate::repo::jobs::{DEFAULT_STALE_AFTER_SECS, Job, JobStore};
use crate::repo::marketplace::{DishCatalog, UserRepo};
use crate::repo::moderation::{ContentRepo, CreatorRepo, ModerationConfigSource};
use crate::repo::notify::{AuditRepo, NotificationRepo};
use crate::repo::orders::OrderStore;
use crate::repo::snapshots::SnapshotStore;
use crate::{DbError, DbResult};

/// In-memory [`JobStore`].
pub struct MemoryJobStore {
    jobs: Mutex<Vec<Job>>,
    stale_after: Duration,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            stale_after: Duration::seconds(DEFAULT_STALE_AFTER_SECS),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Enqueue a raw payload, bypassing the typed union. Lets tests exercise
    /// the dispatcher's handling of undecodable rows.
    pub fn enqueue_raw(&self, job_type: &str, payload: serde_json::Value) -> Job {
        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7(),
            job_type: job_type.to_string(),
            payload,
            status: "pending".into(),
            lock_id: None,
            processor_id: None,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().unwrap().push(job.clone());
        job
    }

    /// Rewind a job's `updated_at`, simulating a worker that died mid-lease.
    pub fn age_job(&self, job_id: Uuid, by: Duration) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.updated_at -= by;
        }
    }
}

fn eligible(job: &Job, now: DateTime<Utc>, stale_after: Duration) -> bool {
    job.status == "pending" || (job.status == "processing" && job.updated_at < now - stale_after)
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, payload: &JobPayload) -> DbResult<Job> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7(),
            job_type: payload.job_type().as_str().to_string(),
            payload: serde_json::to_value(payload)?,
            status: "pending".into(),
            lock_id: None,
            processor_id: None,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn claim_next(&self, processor_id: &str) -> DbResult<Option<Job>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs
            .iter_mut()
            .filter(|j| eligible(j, now, self.stale_after))
            .min_by_key(|j| j.created_at)
        else {
            return Ok(None);
        };
        job.status = "processing".into();
        job.lock_id = Some(Uuid::new_v4());
        job.processor_id = Some(processor_id.to_string());
        job.attempts += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: Uuid, lock_id: Uuid) -> DbResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == "processing" && j.lock_id == Some(lock_id))
        {
            Some(job) => {
                job.status = "completed".into();
                job.lock_id = None;
                job.updated_at = Utc::now();
                Ok(())
            }
            None => Err(DbError::LeaseLost(job_id)),
        }
    }

    async fn fail(&self, job_id: Uuid, lock_id: Uuid, error: &str) -> DbResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == "processing" && j.lock_id == Some(lock_id))
        {
            Some(job) => {
                job.status = "failed".into();
                job.lock_id = None;
                job.last_error = Some(error.to_string());
                job.updated_at = Utc::now();
                Ok(())
            }
            None => Err(DbError::LeaseLost(job_id)),
        }
    }

    async fn pending_count(&self) -> DbResult<i64> {
        let now = Utc::now();
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter()
            .filter(|j| eligible(j, now, self.stale_after))
            .count() as i64)
    }

    async fn get(&self, job_id: Uuid) -> DbResult<Option<Job>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.iter().find(|j| j.id == job_id).cloned())
    }
}

/// In-memory [`SnapshotStore`].
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, PendingOrder>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &PendingOrder) -> DbResult<()> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.payment_reference.clone(), snapshot.clone());
        Ok(())
    }

    async fn get(&self, payment_reference: &str) -> DbResult<Option<PendingOrder>> {
        Ok(self.snapshots.lock().unwrap().get(payment_reference).cloned())
    }

    async fn remove(&self, payment_reference: &str) -> DbResult<()> {
        self.snapshots.lock().unwrap().remove(payment_reference);
        Ok(())
    }
}

struct StoredOrder {
    order: Order,
    refunded: bool,
}

/// In-memory [`OrderStore`].
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<Vec<StoredOrder>>,
    fail_create_set: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_set` fail without storing anything, the way a
    /// rolled-back transaction leaves the table.
    pub fn fail_next_create_set(&self) {
        self.fail_create_set.store(true, Ordering::SeqCst);
    }

    pub fn refunded_count(&self, payment_reference: &str) -> usize {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.order.payment_reference == payment_reference && s.refunded)
            .count()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_set(&self, orders: &[Order]) -> DbResult<()> {
        if self.fail_create_set.swap(false, Ordering::SeqCst) {
            return Err(DbError::Database(sqlx::Error::PoolClosed));
        }
        let mut stored = self.orders.lock().unwrap();
        for order in orders {
            stored.push(StoredOrder {
                order: order.clone(),
                refunded: false,
            });
        }
        Ok(())
    }

    async fn exists_for_payment(&self, payment_reference: &str) -> DbResult<bool> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.order.payment_reference == payment_reference))
    }

    async fn mark_refunded(&self, payment_reference: &str) -> DbResult<u64> {
        let mut orders = self.orders.lock().unwrap();
        let mut touched = 0;
        for stored in orders
            .iter_mut()
            .filter(|s| s.order.payment_reference == payment_reference && !s.refunded)
        {
            stored.refunded = true;
            touched += 1;
        }
        Ok(touched)
    }

    async fn list_for_payment(&self, payment_reference: &str) -> DbResult<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.order.payment_reference == payment_reference)
            .map(|s| s.order.clone())
            .collect())
    }
}

/// In-memory [`ModerationConfigSource`].
pub struct MemoryModerationConfigSource {
    config: Mutex<ModerationConfig>,
}

impl MemoryModerationConfigSource {
    pub fn new(config: ModerationConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    pub fn set(&self, config: ModerationConfig) {
        *self.config.lock().unwrap() = config;
    }
}

#[async_trait]
impl ModerationConfigSource for MemoryModerationConfigSource {
    async fn load(&self) -> DbResult<ModerationConfig> {
        Ok(self.config.lock().unwrap().clone())
    }
}

#[derive(Clone)]
struct ContentState {
    status: String,
    note: Option<String>,
}

/// In-memory [`ContentRepo`].
#[derive(Default)]
pub struct MemoryContentRepo {
    content: Mutex<HashMap<(ContentType, String), ContentState>>,
}

impl MemoryContentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, content_id: &str, content_type: ContentType, status: &str) {
        self.content.lock().unwrap().insert(
            (content_type, content_id.to_string()),
            ContentState {
                status: status.to_string(),
                note: None,
            },
        );
    }

    pub fn status_of(&self, content_id: &str, content_type: ContentType) -> Option<String> {
        self.content
            .lock()
            .unwrap()
            .get(&(content_type, content_id.to_string()))
            .map(|s| s.status.clone())
    }

    pub fn note_of(&self, content_id: &str, content_type: ContentType) -> Option<String> {
        self.content
            .lock()
            .unwrap()
            .get(&(content_type, content_id.to_string()))
            .and_then(|s| s.note.clone())
    }
}

#[async_trait]
impl ContentRepo for MemoryContentRepo {
    async fn flag(
        &self,
        content_id: &str,
        content_type: ContentType,
        note: &str,
    ) -> DbResult<bool> {
        let mut content = self.content.lock().unwrap();
        let state = content
            .get_mut(&(content_type, content_id.to_string()))
            .ok_or_else(|| DbError::NotFound(format!("{content_type} {content_id}")))?;
        if state.status == "flagged" {
            return Ok(false);
        }
        state.status = "flagged".into();
        state.note = Some(note.to_string());
        Ok(true)
    }

    async fn publish(&self, content_id: &str, content_type: ContentType) -> DbResult<bool> {
        let mut content = self.content.lock().unwrap();
        let state = content
            .get_mut(&(content_type, content_id.to_string()))
            .ok_or_else(|| DbError::NotFound(format!("{content_type} {content_id}")))?;
        if state.status != "scheduled" {
            return Ok(false);
        }
        state.status = "published".into();
        Ok(true)
    }
}

#[derive(Clone)]
struct CreatorState {
    status: String,
    note: Option<String>,
}

/// In-memory [`CreatorRepo`].
#[derive(Default)]
pub struct MemoryCreatorRepo {
    creators: Mutex<HashMap<String, CreatorState>>,
    violations: Mutex<HashMap<String, i64>>,
}

impl MemoryCreatorRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, chef_id: &str) {
        self.creators.lock().unwrap().insert(
            chef_id.to_string(),
            CreatorState {
                status: "active".into(),
                note: None,
            },
        );
    }

    pub fn set_violations(&self, chef_id: &str, count: i64) {
        self.violations
            .lock()
            .unwrap()
            .insert(chef_id.to_string(), count);
    }

    pub fn status_of(&self, chef_id: &str) -> Option<String> {
        self.creators
            .lock()
            .unwrap()
            .get(chef_id)
            .map(|s| s.status.clone())
    }

    pub fn note_of(&self, chef_id: &str) -> Option<String> {
        self.creators
            .lock()
            .unwrap()
            .get(chef_id)
            .and_then(|s| s.note.clone())
    }
}

#[async_trait]
impl CreatorRepo for MemoryCreatorRepo {
    async fn resolved_violation_count(&self, chef_id: &str) -> DbResult<i64> {
        Ok(*self.violations.lock().unwrap().get(chef_id).unwrap_or(&0))
    }

    async fn suspend(&self, chef_id: &str, note: &str) -> DbResult<bool> {
        let mut creators = self.creators.lock().unwrap();
        let state = creators
            .get_mut(chef_id)
            .ok_or_else(|| DbError::NotFound(format!("creator {chef_id}")))?;
        if state.status == "suspended" {
            return Ok(false);
        }
        state.status = "suspended".into();
        state.note = Some(note.to_string());
        Ok(true)
    }

    async fn flag(&self, chef_id: &str, note: &str) -> DbResult<bool> {
        let mut creators = self.creators.lock().unwrap();
        let state = creators
            .get_mut(chef_id)
            .ok_or_else(|| DbError::NotFound(format!("creator {chef_id}")))?;
        if state.status == "flagged" || state.status == "suspended" {
            return Ok(false);
        }
        state.status = "flagged".into();
        state.note = Some(note.to_string());
        Ok(true)
    }
}

/// A notification captured by [`MemoryNotificationRepo`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub priority: NotifyPriority,
    pub title: String,
    pub body: String,
}

/// In-memory [`NotificationRepo`].
#[derive(Default)]
pub struct MemoryNotificationRepo {
    sent: Mutex<Vec<SentNotification>>,
}

impl MemoryNotificationRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationRepo for MemoryNotificationRepo {
    async fn notify_admin(
        &self,
        priority: NotifyPriority,
        title: &str,
        body: &str,
    ) -> DbResult<()> {
        self.sent.lock().unwrap().push(SentNotification {
            priority,
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// In-memory [`AuditRepo`].
#[derive(Default)]
pub struct MemoryAuditRepo {
    entries: Mutex<Vec<(String, ReportSeverity)>>,
}

impl MemoryAuditRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, ReportSeverity)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditRepo for MemoryAuditRepo {
    async fn record_report_alert(
        &self,
        report_id: &str,
        severity: ReportSeverity,
    ) -> DbResult<()> {
        self.entries
            .lock()
            .unwrap()
            .push((report_id.to_string(), severity));
        Ok(())
    }
}

/// In-memory [`DishCatalog`].
#[derive(Default)]
pub struct MemoryDishCatalog {
    dishes: Mutex<HashMap<String, String>>,
}

impl MemoryDishCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, dish_id: &str, chef_id: &str) {
        self.dishes
            .lock()
            .unwrap()
            .insert(dish_id.to_string(), chef_id.to_string());
    }
}

#[async_trait]
impl DishCatalog for MemoryDishCatalog {
    async fn chef_for_dish(&self, dish_id: &str) -> DbResult<Option<String>> {
        Ok(self.dishes.lock().unwrap().get(dish_id).cloned())
    }
}

/// A balance credit captured by [`MemoryUserRepo`].
#[derive(Debug, Clone)]
pub struct BalanceCredit {
    pub user_id: String,
    pub amount: i64,
    pub currency: String,
    pub reference: String,
}

/// In-memory [`UserRepo`].
#[derive(Default)]
pub struct MemoryUserRepo {
    cleared_carts: Mutex<Vec<String>>,
    subscriptions: Mutex<HashMap<String, bool>>,
    credits: Mutex<Vec<BalanceCredit>>,
    fail_cart_clear: AtomicBool,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next cart clears fail, for best-effort-path tests.
    pub fn fail_cart_clears(&self) {
        self.fail_cart_clear.store(true, Ordering::SeqCst);
    }

    pub fn cleared_carts(&self) -> Vec<String> {
        self.cleared_carts.lock().unwrap().clone()
    }

    pub fn subscription(&self, user_id: &str) -> Option<bool> {
        self.subscriptions.lock().unwrap().get(user_id).copied()
    }

    pub fn credits(&self) -> Vec<BalanceCredit> {
        self.credits.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn clear_cart(&self, user_id: &str) -> DbResult<()> {
        if self.fail_cart_clear.load(Ordering::SeqCst) {
            return Err(DbError::Database(sqlx::Error::PoolClosed));
        }
        self.cleared_carts.lock().unwrap().push(user_id.to_string());
        Ok(())
    }

    async fn set_subscription(&self, user_id: &str, active: bool) -> DbResult<()> {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(user_id.to_string(), active);
        Ok(())
    }

    async fn credit_balance(
        &self,
        user_id: &str,
        amount: i64,
        currency: &str,
        reference: &str,
    ) -> DbResult<()> {
        let mut credits = self.credits.lock().unwrap();
        if credits.iter().any(|c| c.reference == reference) {
            return Ok(());
        }
        credits.push(BalanceCredit {
            user_id: user_id.to_string(),
            amount,
            currency: currency.to_string(),
            reference: reference.to_string(),
        });
        Ok(())
    }
}
