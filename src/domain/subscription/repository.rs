//! Subscription repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Subscription, SubscriptionCriteria, SubscriptionId};
use crate::domain::DomainError;

/// Repository for subscriptions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    async fn create(&self, subscription: Subscription) -> Result<Subscription, DomainError>;

    async fn update(&self, subscription: Subscription) -> Result<Subscription, DomainError>;

    async fn delete(&self, id: &SubscriptionId) -> Result<bool, DomainError>;

    /// Subscriptions matching the criteria, newest first
    async fn search(
        &self,
        criteria: &SubscriptionCriteria,
    ) -> Result<Vec<Subscription>, DomainError>;
}
