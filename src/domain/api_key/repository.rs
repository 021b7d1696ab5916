//! API key repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{ApiKey, ApiKeyId};
use crate::domain::DomainError;

/// Repository for API keys
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Lookup by the key value itself
    async fn get_by_key(&self, key: &str) -> Result<Option<ApiKey>, DomainError>;

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    async fn update(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError>;

    /// Keys covering a subscription, newest first
    async fn find_by_subscription(&self, subscription: &str) -> Result<Vec<ApiKey>, DomainError>;

    /// Keys issued to an application, newest first
    async fn find_by_application(&self, application: &str) -> Result<Vec<ApiKey>, DomainError>;
}
