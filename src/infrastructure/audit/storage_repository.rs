//! Storage-backed audit repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::audit::{Audit, AuditQuery, AuditRepository};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageAuditRepository {
    storage: Arc<dyn Storage<Audit>>,
}

impl StorageAuditRepository {
    pub fn new(storage: Arc<dyn Storage<Audit>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl AuditRepository for StorageAuditRepository {
    async fn create(&self, audit: Audit) -> Result<Audit, DomainError> {
        self.storage.create(audit).await
    }

    async fn search(&self, query: &AuditQuery) -> Result<Vec<Audit>, DomainError> {
        let mut audits: Vec<Audit> = self
            .storage
            .list()
            .await?
            .into_iter()
            .filter(|a| query.matches(a))
            .collect();

        audits.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(audits)
    }
}
