//! Storage-backed role repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::role::{Role, RoleKey, RoleRepository, RoleScope};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageRoleRepository {
    storage: Arc<dyn Storage<Role>>,
}

impl StorageRoleRepository {
    pub fn new(storage: Arc<dyn Storage<Role>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RoleRepository for StorageRoleRepository {
    async fn get(&self, key: &RoleKey) -> Result<Option<Role>, DomainError> {
        self.storage.get(key).await
    }

    async fn create(&self, role: Role) -> Result<Role, DomainError> {
        self.storage.create(role).await
    }

    async fn update(&self, role: Role) -> Result<Role, DomainError> {
        self.storage.update(role).await
    }

    async fn delete(&self, key: &RoleKey) -> Result<bool, DomainError> {
        self.storage.delete(key).await
    }

    async fn find_by_scope(&self, scope: RoleScope) -> Result<Vec<Role>, DomainError> {
        let mut roles = self.storage.find_by("scope", scope.as_str()).await?;
        roles.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(roles)
    }
}
