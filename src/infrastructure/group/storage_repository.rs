//! Storage-backed group repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::group::{Group, GroupId, GroupRepository};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageGroupRepository {
    storage: Arc<dyn Storage<Group>>,
}

impl StorageGroupRepository {
    pub fn new(storage: Arc<dyn Storage<Group>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl GroupRepository for StorageGroupRepository {
    async fn get(&self, id: &GroupId) -> Result<Option<Group>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, group: Group) -> Result<Group, DomainError> {
        self.storage.create(group).await
    }

    async fn update(&self, group: Group) -> Result<Group, DomainError> {
        if !self.storage.exists(group.id()).await? {
            return Err(DomainError::group_not_found(group.id().as_str()));
        }
        self.storage.update(group).await
    }

    async fn delete(&self, id: &GroupId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn find_by_environment(&self, environment_id: &str) -> Result<Vec<Group>, DomainError> {
        let mut groups = self.storage.find_by("environment_id", environment_id).await?;
        groups.sort_by_key(|g| g.name().to_lowercase());
        Ok(groups)
    }
}
