//! Storage-backed API key repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageApiKeyRepository {
    storage: Arc<dyn Storage<ApiKey>>,
}

impl StorageApiKeyRepository {
    pub fn new(storage: Arc<dyn Storage<ApiKey>>) -> Self {
        Self { storage }
    }

    fn newest_first(mut keys: Vec<ApiKey>) -> Vec<ApiKey> {
        keys.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        keys
    }
}

#[async_trait]
impl ApiKeyRepository for StorageApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        self.storage.get(id).await
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<ApiKey>, DomainError> {
        Ok(self.storage.find_by("key", key).await?.into_iter().next())
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        self.storage.create(api_key).await
    }

    async fn update(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        if !self.storage.exists(api_key.id()).await? {
            return Err(DomainError::api_key_not_found(api_key.id().as_str()));
        }
        self.storage.update(api_key).await
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn find_by_subscription(&self, subscription: &str) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.storage.list().await?;
        Ok(Self::newest_first(
            keys.into_iter().filter(|k| k.covers(subscription)).collect(),
        ))
    }

    async fn find_by_application(&self, application: &str) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.storage.find_by("application", application).await?;
        Ok(Self::newest_first(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    #[tokio::test]
    async fn test_find_by_subscription_and_key() {
        let repo = StorageApiKeyRepository::new(Arc::new(InMemoryStorage::new()));

        let mut shared = ApiKey::new("apim_shared", "h1", "app-1", "sub-1", None);
        shared.add_subscription("sub-2");
        repo.create(shared).await.unwrap();
        repo.create(ApiKey::new("apim_other", "h2", "app-2", "sub-3", None))
            .await
            .unwrap();

        assert_eq!(repo.find_by_subscription("sub-2").await.unwrap().len(), 1);
        assert_eq!(repo.find_by_application("app-1").await.unwrap().len(), 1);
        assert!(repo.get_by_key("apim_other").await.unwrap().is_some());
        assert!(repo.get_by_key("apim_missing").await.unwrap().is_none());
    }
}
