//! Cadence scheduler.
//!
//! Owns a [`JobScheduler`] with two recurring jobs: the hourly due-check
//! that scans every account whose tier interval has elapsed, and the daily
//! rollover that archives yesterday's candidates. The instance is built
//! explicitly and started and stopped by its owner.

mod jobs;

use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

pub use jobs::ScanJobs;

pub struct CadenceScheduler {
    jobs: Arc<ScanJobs>,
    runner: Option<JobScheduler>,
}

impl CadenceScheduler {
    #[must_use]
    pub fn new(jobs: Arc<ScanJobs>) -> Self {
        Self { jobs, runner: None }
    }

    /// Register both jobs and start dispatching. Calling `start` on a running
    /// scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JobSchedulerError`] if a cron expression is invalid or the
    /// runner fails to start.
    pub async fn start(&mut self) -> Result<(), JobSchedulerError> {
        if self.runner.is_some() {
            return Ok(());
        }
        let runner = JobScheduler::new().await?;
        let config = self.jobs.config();

        register_due_check(&runner, &config.scan_check_cron, Arc::clone(&self.jobs)).await?;
        register_rollover(&runner, &config.rollover_cron, Arc::clone(&self.jobs)).await?;

        runner.start().await?;
        tracing::info!(
            due_check = %config.scan_check_cron,
            rollover = %config.rollover_cron,
            "scheduler: started"
        );
        self.runner = Some(runner);
        Ok(())
    }

    /// Stop dispatching. In-flight job runs are not awaited.
    ///
    /// # Errors
    ///
    /// Returns [`JobSchedulerError`] if the runner fails to shut down.
    pub async fn stop(&mut self) -> Result<(), JobSchedulerError> {
        if let Some(mut runner) = self.runner.take() {
            runner.shutdown().await?;
            tracing::info!("scheduler: stopped");
        }
        Ok(())
    }
}

async fn register_due_check(
    runner: &JobScheduler,
    cron: &str,
    jobs: Arc<ScanJobs>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let jobs = Arc::clone(&jobs);
        Box::pin(async move {
            tracing::info!("scheduler: starting due-check");
            let scanned = jobs.run_due_check(Utc::now()).await;
            tracing::info!(scanned, "scheduler: due-check complete");
        })
    })?;
    runner.add(job).await?;
    Ok(())
}

async fn register_rollover(
    runner: &JobScheduler,
    cron: &str,
    jobs: Arc<ScanJobs>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let jobs = Arc::clone(&jobs);
        Box::pin(async move {
            tracing::info!("scheduler: starting daily rollover");
            jobs.run_rollover(Utc::now()).await;
        })
    })?;
    runner.add(job).await?;
    Ok(())
}
