//! Group repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Group, GroupId};
use crate::domain::DomainError;

/// Repository for groups
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &GroupId) -> Result<Option<Group>, DomainError>;

    async fn create(&self, group: Group) -> Result<Group, DomainError>;

    async fn update(&self, group: Group) -> Result<Group, DomainError>;

    async fn delete(&self, id: &GroupId) -> Result<bool, DomainError>;

    /// Groups of an environment, sorted by name
    async fn find_by_environment(&self, environment_id: &str) -> Result<Vec<Group>, DomainError>;
}
