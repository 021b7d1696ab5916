//! Storage-backed API repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::api::{Api, ApiCriteria, ApiId, ApiRepository};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageApiRepository {
    storage: Arc<dyn Storage<Api>>,
}

impl StorageApiRepository {
    pub fn new(storage: Arc<dyn Storage<Api>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ApiRepository for StorageApiRepository {
    async fn get(&self, id: &ApiId) -> Result<Option<Api>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, api: Api) -> Result<Api, DomainError> {
        self.storage.create(api).await
    }

    async fn update(&self, api: Api) -> Result<Api, DomainError> {
        if !self.storage.exists(api.id()).await? {
            return Err(DomainError::api_not_found(api.id().as_str()));
        }
        self.storage.update(api).await
    }

    async fn delete(&self, id: &ApiId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn search(&self, criteria: &ApiCriteria) -> Result<Vec<Api>, DomainError> {
        let mut apis: Vec<Api> = self
            .storage
            .list()
            .await?
            .into_iter()
            .filter(|api| criteria.matches(api))
            .collect();

        apis.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.version().cmp(b.version()))
        });
        Ok(apis)
    }
}
