//! Alert trigger repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{AlertReferenceType, AlertTrigger, AlertTriggerId};
use crate::domain::DomainError;

/// Repository for alert triggers
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertTriggerRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &AlertTriggerId) -> Result<Option<AlertTrigger>, DomainError>;

    async fn create(&self, trigger: AlertTrigger) -> Result<AlertTrigger, DomainError>;

    async fn update(&self, trigger: AlertTrigger) -> Result<AlertTrigger, DomainError>;

    async fn delete(&self, id: &AlertTriggerId) -> Result<bool, DomainError>;

    /// Triggers attached to one reference, sorted by name
    async fn find_by_reference(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
    ) -> Result<Vec<AlertTrigger>, DomainError>;
}
