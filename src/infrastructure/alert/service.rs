//! Alert trigger service

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::alert::{
    AlertReferenceType, AlertSeverity, AlertTrigger, AlertTriggerId, AlertTriggerRepository,
};
use crate::domain::audit::{changes, AuditEvent, AuditProperty, PatchOperation};
use crate::domain::DomainError;
use crate::infrastructure::audit::AuditService;

/// Number of alert engines reported while alerting is on
const BUILTIN_ALERT_ENGINES: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct CreateAlertRequest {
    pub name: String,
    pub description: Option<String>,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub source: Option<String>,
    pub enabled: bool,
    pub conditions: serde_json::Value,
    pub filters: serde_json::Value,
    pub template: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAlertRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub severity: Option<AlertSeverity>,
    pub enabled: Option<bool>,
    pub conditions: Option<serde_json::Value>,
    pub filters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertStatus {
    pub enabled: bool,
    pub plugins: u32,
}

#[derive(Debug)]
pub struct AlertService {
    repository: Arc<dyn AlertTriggerRepository>,
    audit: Arc<AuditService>,
    enabled: bool,
}

impl AlertService {
    pub fn new(
        repository: Arc<dyn AlertTriggerRepository>,
        audit: Arc<AuditService>,
        enabled: bool,
    ) -> Self {
        Self {
            repository,
            audit,
            enabled,
        }
    }

    pub fn status(&self) -> AlertStatus {
        AlertStatus {
            enabled: self.enabled,
            plugins: if self.enabled { BUILTIN_ALERT_ENGINES } else { 0 },
        }
    }

    pub async fn create(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
        request: CreateAlertRequest,
        user: &str,
    ) -> Result<AlertTrigger, DomainError> {
        if !self.enabled {
            return Err(DomainError::validation("Alerting is disabled"));
        }

        if request.name.trim().is_empty() {
            return Err(DomainError::validation("Alert name is required"));
        }

        let mut trigger = AlertTrigger::new(
            reference_type,
            reference_id,
            request.name.trim(),
            request.alert_type,
        )
        .with_description(request.description)
        .with_severity(request.severity)
        .with_enabled(request.enabled)
        .with_template(request.template);

        if let Some(source) = request.source {
            trigger = trigger.with_source(source);
        }
        if !request.conditions.is_null() {
            trigger = trigger.with_conditions(request.conditions);
        }
        if !request.filters.is_null() {
            trigger = trigger.with_filters(request.filters);
        }

        let trigger = self.repository.create(trigger).await?;

        info!(alert_id = %trigger.id(), reference = %reference_type, "Alert trigger created");
        self.record(
            AuditEvent::AlertTriggerCreated,
            &trigger,
            changes(None, Some(&trigger)),
            user,
        )
        .await;

        Ok(trigger)
    }

    pub async fn update(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
        id: &str,
        request: UpdateAlertRequest,
        user: &str,
    ) -> Result<AlertTrigger, DomainError> {
        let previous = self.find_on_reference(reference_type, reference_id, id).await?;
        let mut trigger = previous.clone();

        if let Some(name) = request.name {
            trigger.set_name(name);
        }
        if let Some(description) = request.description {
            trigger.set_description(Some(description));
        }
        if let Some(severity) = request.severity {
            trigger.set_severity(severity);
        }
        if let Some(enabled) = request.enabled {
            trigger.set_enabled(enabled);
        }
        if let Some(conditions) = request.conditions {
            trigger.set_conditions(conditions);
        }
        if let Some(filters) = request.filters {
            trigger.set_filters(filters);
        }

        let trigger = self.repository.update(trigger).await?;
        self.record(
            AuditEvent::AlertTriggerUpdated,
            &trigger,
            changes(Some(&previous), Some(&trigger)),
            user,
        )
        .await;

        Ok(trigger)
    }

    pub async fn delete(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
        id: &str,
        user: &str,
    ) -> Result<(), DomainError> {
        let trigger = self.find_on_reference(reference_type, reference_id, id).await?;
        self.repository.delete(trigger.id()).await?;

        self.record(
            AuditEvent::AlertTriggerDeleted,
            &trigger,
            changes(Some(&trigger), None),
            user,
        )
        .await;

        Ok(())
    }

    /// Remove every trigger of a reference, e.g. when an API is deleted
    pub async fn delete_by_reference(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
    ) -> Result<usize, DomainError> {
        let triggers = self
            .repository
            .find_by_reference(reference_type, reference_id)
            .await?;
        for trigger in &triggers {
            self.repository.delete(trigger.id()).await?;
        }
        Ok(triggers.len())
    }

    pub async fn find_by_reference(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
    ) -> Result<Vec<AlertTrigger>, DomainError> {
        self.repository
            .find_by_reference(reference_type, reference_id)
            .await
    }

    async fn find_on_reference(
        &self,
        reference_type: AlertReferenceType,
        reference_id: &str,
        id: &str,
    ) -> Result<AlertTrigger, DomainError> {
        self.repository
            .get(&AlertTriggerId::new(id))
            .await?
            .filter(|t| t.is_on(reference_type, reference_id))
            .ok_or_else(|| DomainError::alert_not_found(id))
    }

    async fn record(
        &self,
        event: AuditEvent,
        trigger: &AlertTrigger,
        patch: Vec<PatchOperation>,
        user: &str,
    ) {
        let properties = properties(trigger);

        match trigger.reference_type() {
            AlertReferenceType::Api => {
                self.audit
                    .create_api_audit_log(trigger.reference_id(), user, event, properties, patch)
                    .await
            }
            AlertReferenceType::Application => {
                self.audit
                    .create_application_audit_log(
                        trigger.reference_id(),
                        user,
                        event,
                        properties,
                        patch,
                    )
                    .await
            }
            AlertReferenceType::Environment => {
                self.audit
                    .create_environment_audit_log(user, event, properties, patch)
                    .await
            }
        }
    }
}

fn properties(trigger: &AlertTrigger) -> BTreeMap<AuditProperty, String> {
    BTreeMap::from([(AuditProperty::AlertTrigger, trigger.id().to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::alert::StorageAlertTriggerRepository;
    use crate::infrastructure::audit::StorageAuditRepository;
    use crate::infrastructure::storage::InMemoryStorage;

    fn service(enabled: bool) -> AlertService {
        AlertService::new(
            Arc::new(StorageAlertTriggerRepository::new(Arc::new(InMemoryStorage::new()))),
            Arc::new(AuditService::new(
                Arc::new(StorageAuditRepository::new(Arc::new(InMemoryStorage::new()))),
                "DEFAULT",
                "DEFAULT",
            )),
            enabled,
        )
    }

    fn request(name: &str) -> CreateAlertRequest {
        CreateAlertRequest {
            name: name.to_string(),
            alert_type: "METRICS_RATE".to_string(),
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_status() {
        assert_eq!(service(true).status(), AlertStatus { enabled: true, plugins: 1 });
        assert_eq!(service(false).status(), AlertStatus { enabled: false, plugins: 0 });
    }

    #[tokio::test]
    async fn test_create_when_disabled() {
        let err = service(false)
            .create(AlertReferenceType::Api, "api-1", request("Errors"), "u1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Alerting is disabled"));
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let service = service(true);
        service
            .create(AlertReferenceType::Api, "api-1", request("Latency"), "u1")
            .await
            .unwrap();
        service
            .create(AlertReferenceType::Api, "api-1", request("Errors"), "u1")
            .await
            .unwrap();
        service
            .create(AlertReferenceType::Application, "api-1", request("Other"), "u1")
            .await
            .unwrap();

        let names: Vec<_> = service
            .find_by_reference(AlertReferenceType::Api, "api-1")
            .await
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["Errors", "Latency"]);
    }

    #[tokio::test]
    async fn test_update_through_wrong_reference() {
        let service = service(true);
        let trigger = service
            .create(AlertReferenceType::Api, "api-1", request("Errors"), "u1")
            .await
            .unwrap();

        let err = service
            .update(
                AlertReferenceType::Api,
                "api-2",
                trigger.id().as_str(),
                UpdateAlertRequest::default(),
                "u1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let updated = service
            .update(
                AlertReferenceType::Api,
                "api-1",
                trigger.id().as_str(),
                UpdateAlertRequest {
                    enabled: Some(false),
                    severity: Some(AlertSeverity::Critical),
                    ..Default::default()
                },
                "u1",
            )
            .await
            .unwrap();
        assert!(!updated.is_enabled());
        assert_eq!(updated.severity(), AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn test_delete() {
        let service = service(true);
        let trigger = service
            .create(AlertReferenceType::Environment, "DEFAULT", request("Health"), "u1")
            .await
            .unwrap();

        let err = service
            .delete(AlertReferenceType::Api, "DEFAULT", trigger.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        service
            .delete(AlertReferenceType::Environment, "DEFAULT", trigger.id().as_str(), "u1")
            .await
            .unwrap();
        assert!(service
            .find_by_reference(AlertReferenceType::Environment, "DEFAULT")
            .await
            .unwrap()
            .is_empty());
    }
}
