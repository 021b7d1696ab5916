//! Application repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Application, ApplicationCriteria, ApplicationId};
use crate::domain::DomainError;

/// Repository for applications
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApplicationRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &ApplicationId) -> Result<Option<Application>, DomainError>;

    async fn create(&self, application: Application) -> Result<Application, DomainError>;

    async fn update(&self, application: Application) -> Result<Application, DomainError>;

    /// Hard delete; archiving is an update
    async fn delete(&self, id: &ApplicationId) -> Result<bool, DomainError>;

    /// Applications matching the criteria, sorted by name
    async fn search(
        &self,
        criteria: &ApplicationCriteria,
    ) -> Result<Vec<Application>, DomainError>;
}
