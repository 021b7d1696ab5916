//! Storage-backed user repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::storage::Storage;
use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageUserRepository {
    storage: Arc<dyn Storage<User>>,
}

impl StorageUserRepository {
    pub fn new(storage: Arc<dyn Storage<User>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl UserRepository for StorageUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        self.storage.get(id).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let users = self.storage.list().await?;
        Ok(users
            .into_iter()
            .find(|u| u.username().eq_ignore_ascii_case(username)))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let users = self.storage.list().await?;
        Ok(users
            .into_iter()
            .find(|u| u.email().is_some_and(|e| e.eq_ignore_ascii_case(email))))
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        self.storage.create(user).await
    }

    async fn update(&self, user: User) -> Result<User, DomainError> {
        if !self.storage.exists(user.id()).await? {
            return Err(DomainError::user_not_found(user.id().as_str()));
        }
        self.storage.update(user).await
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        let mut users = self.storage.list().await?;
        users.sort_by(|a, b| a.username().cmp(b.username()));
        Ok(users)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        self.storage.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    fn repo() -> StorageUserRepository {
        StorageUserRepository::new(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let repo = repo();
        repo.create(User::new("DEFAULT", "JDoe").with_email("JDoe@Example.com"))
            .await
            .unwrap();

        assert!(repo.get_by_username("jdoe").await.unwrap().is_some());
        assert!(repo.get_by_email("jdoe@example.com").await.unwrap().is_some());
        assert!(repo.get_by_username("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_by_username() {
        let repo = repo();
        repo.create(User::new("DEFAULT", "zoe")).await.unwrap();
        repo.create(User::new("DEFAULT", "adam")).await.unwrap();

        let users = repo.list().await.unwrap();
        assert_eq!(users[0].username(), "adam");
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let result = repo().update(User::new("DEFAULT", "ghost")).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
