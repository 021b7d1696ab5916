//! Api repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Api, ApiCriteria, ApiId};
use crate::domain::DomainError;

/// Repository for APIs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &ApiId) -> Result<Option<Api>, DomainError>;

    async fn create(&self, api: Api) -> Result<Api, DomainError>;

    async fn update(&self, api: Api) -> Result<Api, DomainError>;

    async fn delete(&self, id: &ApiId) -> Result<bool, DomainError>;

    /// APIs matching the criteria, sorted by name
    async fn search(&self, criteria: &ApiCriteria) -> Result<Vec<Api>, DomainError>;
}
