//! Async job service

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::domain::async_job::{
    AsyncJob, AsyncJobCriteria, AsyncJobId, AsyncJobRepository, AsyncJobType,
};
use crate::domain::DomainError;

/// Time a job may stay pending before the sweeper times it out
pub const DEFAULT_JOB_TIME_TO_LIVE_MINUTES: i64 = 5;

#[derive(Debug)]
pub struct AsyncJobService {
    repository: Arc<dyn AsyncJobRepository>,
    environment_id: String,
}

impl AsyncJobService {
    pub fn new(repository: Arc<dyn AsyncJobRepository>, environment_id: impl Into<String>) -> Self {
        Self {
            repository,
            environment_id: environment_id.into(),
        }
    }

    pub async fn create(
        &self,
        job_type: AsyncJobType,
        source_id: &str,
        initiator_id: &str,
        upper_limit: u64,
    ) -> Result<AsyncJob, DomainError> {
        let job = AsyncJob::new(
            job_type,
            source_id,
            &self.environment_id,
            initiator_id,
            upper_limit,
            Duration::minutes(DEFAULT_JOB_TIME_TO_LIVE_MINUTES),
        );

        self.repository.create(job).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<AsyncJob, DomainError> {
        self.repository
            .get(&AsyncJobId::new(id))
            .await?
            .ok_or_else(|| DomainError::async_job_not_found(id))
    }

    /// Jobs matching the criteria, newest first
    pub async fn search(&self, criteria: &AsyncJobCriteria) -> Result<Vec<AsyncJob>, DomainError> {
        self.repository.search(criteria).await
    }

    pub async fn update_progress(&self, id: &str, counter: u64) -> Result<AsyncJob, DomainError> {
        let mut job = self.find_by_id(id).await?;
        job.set_counter(counter);
        self.repository.update(job).await
    }

    pub async fn complete(&self, id: &str) -> Result<AsyncJob, DomainError> {
        let mut job = self.find_by_id(id).await?;
        job.complete();
        self.repository.update(job).await
    }

    pub async fn fail(&self, id: &str, message: &str) -> Result<AsyncJob, DomainError> {
        let mut job = self.find_by_id(id).await?;
        job.fail(message);
        self.repository.update(job).await
    }

    /// Mark pending jobs past their dead line as timed out
    pub async fn timeout_late_jobs(&self) -> Result<usize, DomainError> {
        let now = Utc::now();
        let late: Vec<AsyncJob> = self
            .repository
            .search(&AsyncJobCriteria::default())
            .await?
            .into_iter()
            .filter(|job| job.is_late_at(now))
            .collect();

        let count = late.len();
        for mut job in late {
            warn!(job_id = %job.id(), dead_line = %job.dead_line(), "Async job timed out");
            job.time_out();
            self.repository.update(job).await?;
        }

        if count > 0 {
            info!(count, "Late async jobs timed out");
        }
        Ok(count)
    }
}
