//! Lease-driven job dispatch.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nosh_core::Error;
use nosh_db::{DbError, DbResult, JobStore};

use crate::handlers::Handlers;

/// What a single dispatcher tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No eligible work.
    Idle,
    Completed {
        job_id: Uuid,
    },
    Failed {
        job_id: Uuid,
        error: String,
    },
    /// The job's lease was stolen by a reclaim while we held it. The new
    /// owner proceeds independently; our write was dropped.
    LeaseLost {
        job_id: Uuid,
    },
}

/// Claims jobs from the store and routes them to handlers.
///
/// One job per tick, by design: each tick is a short, auditable unit of work
/// driven by an external scheduler. Throughput scales by running more
/// dispatcher instances with distinct processor ids.
pub struct Dispatcher {
    processor_id: String,
    jobs: Arc<dyn JobStore>,
    handlers: Handlers,
}

impl Dispatcher {
    pub fn new(processor_id: impl Into<String>, jobs: Arc<dyn JobStore>, handlers: Handlers) -> Self {
        Self {
            processor_id: processor_id.into(),
            jobs,
            handlers,
        }
    }

    pub fn processor_id(&self) -> &str {
        &self.processor_id
    }

    /// Claim and process at most one job.
    ///
    /// Handler failures never propagate: they are captured and written back
    /// through the fenced `fail`, leaving the job's error on record. Only
    /// store errors surface to the caller.
    pub async fn run_tick(&self) -> DbResult<TickOutcome> {
        // Cheap probe so idle ticks never contend on the claim path.
        if self.jobs.pending_count().await? == 0 {
            return Ok(TickOutcome::Idle);
        }

        let Some(job) = self.jobs.claim_next(&self.processor_id).await? else {
            return Ok(TickOutcome::Idle);
        };
        let Some(lock_id) = job.lock_id else {
            // claim_next always stamps a lock; a bare row means the store is
            // misbehaving, and without a fence we must not touch the job.
            warn!(job_id = %job.id, "claimed job carries no lock, skipping");
            return Ok(TickOutcome::Idle);
        };

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            processor_id = %self.processor_id,
            attempt = job.attempts,
            "claimed job"
        );

        let result = match job.decode_payload() {
            Ok(payload) => self.handlers.handle(payload).await,
            // Undecodable payloads can never succeed; fail them permanently.
            Err(e) => Err(Error::Validation(format!("undecodable payload: {e}"))),
        };

        match result {
            Ok(()) => match self.jobs.complete(job.id, lock_id).await {
                Ok(()) => {
                    info!(job_id = %job.id, "job completed");
                    Ok(TickOutcome::Completed { job_id: job.id })
                }
                Err(DbError::LeaseLost(_)) => {
                    debug!(job_id = %job.id, "lease lost before completion, dropping result");
                    Ok(TickOutcome::LeaseLost { job_id: job.id })
                }
                Err(e) => Err(e),
            },
            Err(err) => {
                let message = err.to_string();
                warn!(job_id = %job.id, error = %message, "job handler failed");
                match self.jobs.fail(job.id, lock_id, &message).await {
                    Ok(()) => Ok(TickOutcome::Failed {
                        job_id: job.id,
                        error: message,
                    }),
                    Err(DbError::LeaseLost(_)) => {
                        debug!(job_id = %job.id, "lease lost before failure writeback");
                        Ok(TickOutcome::LeaseLost { job_id: job.id })
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Long-running polling loop for deployments without an external
    /// scheduler: tick, sleep when idle, back off on store errors.
    pub async fn run(&self, poll_interval: Duration) {
        info!(processor_id = %self.processor_id, "starting dispatcher loop");
        loop {
            match self.run_tick().await {
                Ok(TickOutcome::Idle) => sleep(poll_interval).await,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "dispatcher tick failed");
                    sleep(poll_interval * 5).await;
                }
            }
        }
    }
}
