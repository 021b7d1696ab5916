//! Alert trigger entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// Alert trigger identifier
    AlertTriggerId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertReferenceType {
    Api,
    Application,
    Environment,
}

impl AlertReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Application => "APPLICATION",
            Self::Environment => "ENVIRONMENT",
        }
    }
}

impl std::fmt::Display for AlertReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    #[default]
    Info,
    Warning,
    Critical,
}

/// A rule raising alerts on gateway events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertTrigger {
    id: AlertTriggerId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    reference_type: AlertReferenceType,
    reference_id: String,
    #[serde(rename = "type")]
    alert_type: String,
    #[serde(default)]
    severity: AlertSeverity,
    #[serde(default)]
    source: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    conditions: serde_json::Value,
    #[serde(default)]
    filters: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<bool>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(AlertTrigger, id);

impl AlertTrigger {
    pub fn new(
        reference_type: AlertReferenceType,
        reference_id: impl Into<String>,
        name: impl Into<String>,
        alert_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: AlertTriggerId::generate(),
            name: name.into(),
            description: None,
            reference_type,
            reference_id: reference_id.into(),
            alert_type: alert_type.into(),
            severity: AlertSeverity::default(),
            source: "REQUEST".to_string(),
            enabled: true,
            conditions: serde_json::Value::Array(vec![]),
            filters: serde_json::Value::Array(vec![]),
            template: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_conditions(mut self, conditions: serde_json::Value) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_filters(mut self, filters: serde_json::Value) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_template(mut self, template: Option<bool>) -> Self {
        self.template = template;
        self
    }

    // Getters

    pub fn id(&self) -> &AlertTriggerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn reference_type(&self) -> AlertReferenceType {
        self.reference_type
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn alert_type(&self) -> &str {
        &self.alert_type
    }

    pub fn severity(&self) -> AlertSeverity {
        self.severity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn conditions(&self) -> &serde_json::Value {
        &self.conditions
    }

    pub fn filters(&self) -> &serde_json::Value {
        &self.filters
    }

    pub fn template(&self) -> Option<bool> {
        self.template
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_on(&self, reference_type: AlertReferenceType, reference_id: &str) -> bool {
        self.reference_type == reference_type && self.reference_id == reference_id
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn set_severity(&mut self, severity: AlertSeverity) {
        self.severity = severity;
        self.touch();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.touch();
    }

    pub fn set_conditions(&mut self, conditions: serde_json::Value) {
        self.conditions = conditions;
        self.touch();
    }

    pub fn set_filters(&mut self, filters: serde_json::Value) {
        self.filters = filters;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for AlertTrigger {
    type Key = AlertTriggerId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_match() {
        let trigger = AlertTrigger::new(AlertReferenceType::Api, "api-1", "Errors", "METRICS_RATE");

        assert!(trigger.is_on(AlertReferenceType::Api, "api-1"));
        assert!(!trigger.is_on(AlertReferenceType::Application, "api-1"));
        assert!(!trigger.is_on(AlertReferenceType::Api, "api-2"));
    }

    #[test]
    fn test_type_field_name() {
        let trigger = AlertTrigger::new(AlertReferenceType::Environment, "DEFAULT", "Health", "HEALTH")
            .with_severity(AlertSeverity::Critical);

        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["type"], "HEALTH");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["reference_type"], "ENVIRONMENT");
    }
}
