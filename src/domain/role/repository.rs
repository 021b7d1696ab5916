//! Role repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Role, RoleKey};
use super::permission::RoleScope;
use crate::domain::DomainError;

/// Repository for roles
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &RoleKey) -> Result<Option<Role>, DomainError>;

    async fn create(&self, role: Role) -> Result<Role, DomainError>;

    async fn update(&self, role: Role) -> Result<Role, DomainError>;

    async fn delete(&self, key: &RoleKey) -> Result<bool, DomainError>;

    /// All roles of a scope, sorted by name
    async fn find_by_scope(&self, scope: RoleScope) -> Result<Vec<Role>, DomainError>;
}
