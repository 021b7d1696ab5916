//! User repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{User, UserId};
use crate::domain::DomainError;

/// Repository for managing users
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Case-insensitive lookup by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError>;

    /// Case-insensitive lookup by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    async fn create(&self, user: User) -> Result<User, DomainError>;

    async fn update(&self, user: User) -> Result<User, DomainError>;

    async fn list(&self) -> Result<Vec<User>, DomainError>;

    async fn count(&self) -> Result<usize, DomainError>;
}
