//! Storage-backed alert trigger repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::alert::{
    AlertReferenceType, AlertTrigger, AlertTriggerId, AlertTriggerRepository,
};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageAlertTriggerRepository {
    storage: Arc<dyn Storage<AlertTrigger>>,
}

impl StorageAlertTriggerRepository {
    pub fn new(storage: Arc<dyn Storage<AlertTrigger>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl AlertTriggerRepository for StorageAlertTriggerRepository {
    async fn get(&self, id: &AlertTriggerId) -> Result<Option<AlertTrigger>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, trigger: AlertTrigger) -> Result<AlertTrigger, DomainError> {
        self.storage.create(trigger).await
    }

    async fn update(&self, trigger: AlertTrigger) -> Result<AlertTrigger, DomainError> {
        self.storage.update(trigger).await
    }

    async fn delete(&self, id: &AlertTriggerId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn find_by_reference(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
    ) -> Result<Vec<AlertTrigger>, DomainError> {
        let mut triggers: Vec<AlertTrigger> = self
            .storage
            .find_by("reference_id", reference_id)
            .await?
            .into_iter()
            .filter(|t| t.reference_type() == reference_type)
            .collect();

        triggers.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(triggers)
    }
}
