//! Background job scheduler.
//!
//! Requires the `background-jobs` feature.
//!
//! # Available Jobs
//!
//! - **Pool Refill**: tops the activation code pool up with one batch
//!   whenever the number of issuable codes drops below a threshold, so
//!   callers of `POST /code/get` rarely pay for generation inline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use activator::jobs::{JobConfig, JobScheduler};
//!
//! let scheduler = JobScheduler::new(db, JobConfig::default()).await?;
//! scheduler.start().await?;
//! ```

use chrono::Utc;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::{error, info};

use crate::activation_code::CodeBatchConfig;
use crate::server::database::Database;
use crate::server::handlers::RefillLock;

mod pool_refill;

pub use pool_refill::run_pool_refill;

/// Configuration for background jobs.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Cron expression for the pool refill check (default: every 5 minutes)
    pub pool_refill_cron: String,
    /// Refill when fewer than this many codes are issuable (default: 100)
    pub min_available: i64,
    /// Size and seed of each generated batch
    pub batch: CodeBatchConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            pool_refill_cron: "0 */5 * * * *".to_string(),
            min_available: 100,
            batch: CodeBatchConfig::default(),
        }
    }
}

/// Background job scheduler.
pub struct JobScheduler {
    scheduler: TokioJobScheduler,
    db: Arc<Database>,
    config: JobConfig,
    refill_lock: RefillLock,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub async fn new(db: Arc<Database>, config: JobConfig) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            db,
            config,
            refill_lock: RefillLock::default(),
        })
    }

    /// Share the refill lock of a running server (see [`AppState::refill_lock`]).
    ///
    /// [`AppState::refill_lock`]: crate::server::handlers::AppState::refill_lock
    pub fn with_refill_lock(mut self, refill_lock: RefillLock) -> Self {
        self.refill_lock = refill_lock;
        self
    }

    /// Register all jobs and start the scheduler.
    pub async fn start(&self) -> Result<(), JobError> {
        info!("Starting job scheduler");

        self.add_pool_refill_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Job scheduler started successfully");

        Ok(())
    }

    /// Stop the job scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down job scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        Ok(())
    }

    async fn add_pool_refill_job(&self) -> Result<(), JobError> {
        let db = Arc::clone(&self.db);
        let refill_lock = Arc::clone(&self.refill_lock);
        let min_available = self.config.min_available;
        let batch = self.config.batch.clone();

        let job = Job::new_async(self.config.pool_refill_cron.as_str(), move |_uuid, _l| {
            let db = Arc::clone(&db);
            let refill_lock = Arc::clone(&refill_lock);
            let batch = batch.clone();
            Box::pin(async move {
                let now = Utc::now().naive_utc();
                info!("Running pool refill check at {}", now);

                match run_pool_refill(&db, &refill_lock, min_available, &batch).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pool refill: {} codes generated", count);
                        }
                    }
                    Err(e) => {
                        error!("Pool refill failed: {}", e);
                    }
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(
            "Added pool refill job (schedule: {}, threshold: {} codes)",
            self.config.pool_refill_cron, self.config.min_available
        );

        Ok(())
    }

    /// Run the pool refill check immediately.
    pub async fn run_pool_refill_now(&self) -> Result<u64, JobError> {
        run_pool_refill(
            &self.db,
            &self.refill_lock,
            self.config.min_available,
            &self.config.batch,
        )
        .await
    }
}

/// Errors that can occur in the job scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::errors::LicenseError> for JobError {
    fn from(err: crate::errors::LicenseError) -> Self {
        JobError::DatabaseError(err.to_string())
    }
}
