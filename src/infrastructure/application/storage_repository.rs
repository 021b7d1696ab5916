//! Storage-backed application repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::application::{
    Application, ApplicationCriteria, ApplicationId, ApplicationRepository,
};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageApplicationRepository {
    storage: Arc<dyn Storage<Application>>,
}

impl StorageApplicationRepository {
    pub fn new(storage: Arc<dyn Storage<Application>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ApplicationRepository for StorageApplicationRepository {
    async fn get(&self, id: &ApplicationId) -> Result<Option<Application>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, application: Application) -> Result<Application, DomainError> {
        self.storage.create(application).await
    }

    async fn update(&self, application: Application) -> Result<Application, DomainError> {
        if !self.storage.exists(application.id()).await? {
            return Err(DomainError::application_not_found(application.id().as_str()));
        }
        self.storage.update(application).await
    }

    async fn delete(&self, id: &ApplicationId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn search(
        &self,
        criteria: &ApplicationCriteria,
    ) -> Result<Vec<Application>, DomainError> {
        let mut applications: Vec<Application> = self
            .storage
            .list()
            .await?
            .into_iter()
            .filter(|app| criteria.matches(app))
            .collect();

        applications.sort_by_key(|app| app.name().to_lowercase());
        Ok(applications)
    }
}
