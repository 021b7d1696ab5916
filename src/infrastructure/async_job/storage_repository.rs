//! Storage-backed async job repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::async_job::{AsyncJob, AsyncJobCriteria, AsyncJobId, AsyncJobRepository};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageAsyncJobRepository {
    storage: Arc<dyn Storage<AsyncJob>>,
}

impl StorageAsyncJobRepository {
    pub fn new(storage: Arc<dyn Storage<AsyncJob>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl AsyncJobRepository for StorageAsyncJobRepository {
    async fn get(&self, id: &AsyncJobId) -> Result<Option<AsyncJob>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, job: AsyncJob) -> Result<AsyncJob, DomainError> {
        self.storage.create(job).await
    }

    async fn update(&self, job: AsyncJob) -> Result<AsyncJob, DomainError> {
        if !self.storage.exists(job.id()).await? {
            return Err(DomainError::async_job_not_found(job.id().as_str()));
        }
        self.storage.update(job).await
    }

    async fn search(&self, criteria: &AsyncJobCriteria) -> Result<Vec<AsyncJob>, DomainError> {
        let mut jobs: Vec<AsyncJob> = self
            .storage
            .list()
            .await?
            .into_iter()
            .filter(|j| criteria.matches(j))
            .collect();

        jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(jobs)
    }
}
