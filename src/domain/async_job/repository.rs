//! Async job repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{AsyncJob, AsyncJobCriteria, AsyncJobId};
use crate::domain::DomainError;

/// Repository for async jobs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AsyncJobRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &AsyncJobId) -> Result<Option<AsyncJob>, DomainError>;

    async fn create(&self, job: AsyncJob) -> Result<AsyncJob, DomainError>;

    async fn update(&self, job: AsyncJob) -> Result<AsyncJob, DomainError>;

    /// Jobs matching the criteria, newest first
    async fn search(&self, criteria: &AsyncJobCriteria) -> Result<Vec<AsyncJob>, DomainError>;
}
