//! Audit service

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::audit::{
    Audit, AuditEvent, AuditProperty, AuditQuery, AuditReferenceType, AuditRepository,
    PatchOperation,
};
use crate::domain::{DomainError, Page, Pageable};

pub type AuditProperties = BTreeMap<AuditProperty, String>;

/// Records and searches audit events for the configured organization and environment
#[derive(Debug)]
pub struct AuditService {
    repository: Arc<dyn AuditRepository>,
    organization_id: String,
    environment_id: String,
}

impl AuditService {
    pub fn new(
        repository: Arc<dyn AuditRepository>,
        organization_id: impl Into<String>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            organization_id: organization_id.into(),
            environment_id: environment_id.into(),
        }
    }

    pub async fn create_api_audit_log(
        &self,
        api_id: &str,
        user: &str,
        event: AuditEvent,
        properties: AuditProperties,
        patch: Vec<PatchOperation>,
    ) {
        self.create(AuditReferenceType::Api, api_id, user, event, properties, patch)
            .await
    }

    pub async fn create_application_audit_log(
        &self,
        application_id: &str,
        user: &str,
        event: AuditEvent,
        properties: AuditProperties,
        patch: Vec<PatchOperation>,
    ) {
        self.create(
            AuditReferenceType::Application,
            application_id,
            user,
            event,
            properties,
            patch,
        )
        .await
    }

    pub async fn create_environment_audit_log(
        &self,
        user: &str,
        event: AuditEvent,
        properties: AuditProperties,
        patch: Vec<PatchOperation>,
    ) {
        let environment_id = self.environment_id.clone();
        self.create(
            AuditReferenceType::Environment,
            &environment_id,
            user,
            event,
            properties,
            patch,
        )
        .await
    }

    pub async fn create_organization_audit_log(
        &self,
        user: &str,
        event: AuditEvent,
        properties: AuditProperties,
        patch: Vec<PatchOperation>,
    ) {
        let organization_id = self.organization_id.clone();
        self.create(
            AuditReferenceType::Organization,
            &organization_id,
            user,
            event,
            properties,
            patch,
        )
        .await
    }

    /// Audit writes never fail the operation being audited
    async fn create(
        &self,
        reference_type: AuditReferenceType,
        reference_id: &str,
        user: &str,
        event: AuditEvent,
        properties: AuditProperties,
        patch: Vec<PatchOperation>,
    ) {
        let audit = Audit::new(
            &self.organization_id,
            &self.environment_id,
            reference_type,
            reference_id,
            user,
            event,
        )
        .with_properties(properties)
        .with_patch(patch);

        match self.repository.create(audit).await {
            Ok(audit) => debug!(event = %audit.event(), reference_id, "Audit recorded"),
            Err(e) => warn!(event = %event, reference_id, error = %e, "Failed to record audit"),
        }
    }

    /// Paged search, newest first
    pub async fn search(
        &self,
        query: &AuditQuery,
        pageable: Pageable,
    ) -> Result<Page<Audit>, DomainError> {
        let audits = self.repository.search(query).await?;
        Ok(Page::of(audits, pageable))
    }

    pub fn events(&self) -> &'static [AuditEvent] {
        AuditEvent::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::MockAuditRepository;
    use crate::infrastructure::audit::StorageAuditRepository;
    use crate::infrastructure::storage::InMemoryStorage;

    fn service() -> AuditService {
        let repository = Arc::new(StorageAuditRepository::new(Arc::new(InMemoryStorage::new())));
        AuditService::new(repository, "DEFAULT", "DEFAULT")
    }

    #[tokio::test]
    async fn test_search_by_reference() {
        let service = service();

        service
            .create_api_audit_log("api-1", "u1", AuditEvent::ApiCreated, BTreeMap::new(), vec![])
            .await;
        service
            .create_api_audit_log("api-2", "u1", AuditEvent::ApiCreated, BTreeMap::new(), vec![])
            .await;
        service
            .create_environment_audit_log("u1", AuditEvent::GroupCreated, BTreeMap::new(), vec![])
            .await;

        let query = AuditQuery {
            reference_type: Some(AuditReferenceType::Api),
            reference_ids: vec!["api-1".into()],
            ..Default::default()
        };
        let page = service.search(&query, Pageable::default()).await.unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].reference_id(), "api-1");

        let page = service
            .search(&AuditQuery::default(), Pageable::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.content.len(), 2);
    }

    #[tokio::test]
    async fn test_repository_failure_is_swallowed() {
        let mut repository = MockAuditRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|_| Err(DomainError::storage("down")));

        let service = AuditService::new(Arc::new(repository), "DEFAULT", "DEFAULT");
        service
            .create_organization_audit_log("u1", AuditEvent::UserCreated, BTreeMap::new(), vec![])
            .await;
    }
}
