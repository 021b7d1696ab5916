//! Plan entity and related types

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// Plan identifier
    PlanId
);

/// How consumers authenticate against a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanSecurity {
    KeyLess,
    ApiKey,
    Jwt,
    Oauth2,
}

impl PlanSecurity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyLess => "KEY_LESS",
            Self::ApiKey => "API_KEY",
            Self::Jwt => "JWT",
            Self::Oauth2 => "OAUTH2",
        }
    }
}

/// Whether subscriptions are accepted automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanValidation {
    Auto,
    #[default]
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    #[default]
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    #[default]
    Staging,
    Published,
    Deprecated,
    Closed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "STAGING",
            Self::Published => "PUBLISHED",
            Self::Deprecated => "DEPRECATED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "STAGING" => Some(Self::Staging),
            "PUBLISHED" => Some(Self::Published),
            "DEPRECATED" => Some(Self::Deprecated),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan through which applications subscribe to an API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    id: PlanId,
    api: String,
    name: String,
    #[serde(default)]
    description: String,
    security: PlanSecurity,
    #[serde(default)]
    validation: PlanValidation,
    #[serde(rename = "type", default)]
    plan_type: PlanType,
    #[serde(default)]
    status: PlanStatus,
    #[serde(default)]
    order: u32,
    #[serde(default)]
    characteristics: Vec<String>,
    #[serde(default)]
    excluded_groups: BTreeSet<String>,
    #[serde(default)]
    comment_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    need_redeploy_at: Option<DateTime<Utc>>,
}

crate::identity_eq!(Plan, id);

impl Plan {
    /// Create a staging plan; keyless plans are always auto-validated
    pub fn new(api: impl Into<String>, name: impl Into<String>, security: PlanSecurity) -> Self {
        let now = Utc::now();
        let validation = if security == PlanSecurity::KeyLess {
            PlanValidation::Auto
        } else {
            PlanValidation::default()
        };

        Self {
            id: PlanId::generate(),
            api: api.into(),
            name: name.into(),
            description: String::new(),
            security,
            validation,
            plan_type: PlanType::Api,
            status: PlanStatus::Staging,
            order: 0,
            characteristics: Vec::new(),
            excluded_groups: BTreeSet::new(),
            comment_required: false,
            comment_message: None,
            created_at: now,
            updated_at: now,
            published_at: None,
            closed_at: None,
            need_redeploy_at: Some(now),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_validation(mut self, validation: PlanValidation) -> Self {
        if self.security != PlanSecurity::KeyLess {
            self.validation = validation;
        }
        self
    }

    pub fn with_characteristics(mut self, characteristics: Vec<String>) -> Self {
        self.characteristics = characteristics;
        self
    }

    pub fn with_excluded_groups(mut self, groups: BTreeSet<String>) -> Self {
        self.excluded_groups = groups;
        self
    }

    pub fn with_comment(mut self, required: bool, message: Option<String>) -> Self {
        self.comment_required = required;
        self.comment_message = message;
        self
    }

    // Getters

    pub fn id(&self) -> &PlanId {
        &self.id
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn security(&self) -> PlanSecurity {
        self.security
    }

    pub fn validation(&self) -> PlanValidation {
        self.validation
    }

    pub fn plan_type(&self) -> PlanType {
        self.plan_type
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn characteristics(&self) -> &[String] {
        &self.characteristics
    }

    pub fn excluded_groups(&self) -> &BTreeSet<String> {
        &self.excluded_groups
    }

    pub fn comment_required(&self) -> bool {
        self.comment_required
    }

    pub fn comment_message(&self) -> Option<&str> {
        self.comment_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn need_redeploy_at(&self) -> Option<DateTime<Utc>> {
        self.need_redeploy_at
    }

    pub fn belongs_to(&self, api: &str) -> bool {
        self.api == api
    }

    pub fn is_closed(&self) -> bool {
        self.status == PlanStatus::Closed
    }

    pub fn is_published(&self) -> bool {
        self.status == PlanStatus::Published
    }

    pub fn is_keyless(&self) -> bool {
        self.security == PlanSecurity::KeyLess
    }

    pub fn is_auto_validated(&self) -> bool {
        self.validation == PlanValidation::Auto
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn set_validation(&mut self, validation: PlanValidation) {
        if self.security != PlanSecurity::KeyLess {
            self.validation = validation;
            self.touch();
        }
    }

    pub fn set_characteristics(&mut self, characteristics: Vec<String>) {
        self.characteristics = characteristics;
        self.touch();
    }

    pub fn set_excluded_groups(&mut self, groups: BTreeSet<String>) {
        self.excluded_groups = groups;
        self.touch();
    }

    pub fn set_comment(&mut self, required: bool, message: Option<String>) {
        self.comment_required = required;
        self.comment_message = message;
        self.touch();
    }

    pub fn set_order(&mut self, order: u32) {
        self.order = order;
        self.touch();
    }

    pub fn publish(&mut self, order: u32) {
        let now = Utc::now();
        self.status = PlanStatus::Published;
        self.order = order;
        self.published_at = Some(now);
        self.need_redeploy_at = Some(now);
        self.touch();
    }

    pub fn deprecate(&mut self) {
        self.status = PlanStatus::Deprecated;
        self.need_redeploy_at = Some(Utc::now());
        self.touch();
    }

    pub fn close(&mut self) {
        let now = Utc::now();
        self.status = PlanStatus::Closed;
        self.closed_at = Some(now);
        self.need_redeploy_at = Some(now);
        self.order = 0;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Plan {
    type Key = PlanId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_plan_defaults() {
        let plan = Plan::new("api-1", "Gold", PlanSecurity::ApiKey);

        assert_eq!(plan.status(), PlanStatus::Staging);
        assert_eq!(plan.validation(), PlanValidation::Manual);
        assert_eq!(plan.plan_type(), PlanType::Api);
        assert_eq!(plan.order(), 0);
        assert!(plan.belongs_to("api-1"));
    }

    #[test]
    fn test_keyless_plan_is_auto() {
        let plan = Plan::new("api-1", "Free", PlanSecurity::KeyLess)
            .with_validation(PlanValidation::Manual);

        assert_eq!(plan.validation(), PlanValidation::Auto);
        assert!(plan.is_keyless());
    }

    #[test]
    fn test_publish_then_close() {
        let mut plan = Plan::new("api-1", "Gold", PlanSecurity::ApiKey);

        plan.publish(3);
        assert!(plan.is_published());
        assert_eq!(plan.order(), 3);
        assert!(plan.published_at().is_some());

        plan.close();
        assert!(plan.is_closed());
        assert_eq!(plan.order(), 0);
        assert!(plan.closed_at().is_some());
    }

    #[test]
    fn test_type_field_name() {
        let json = serde_json::to_value(Plan::new("api-1", "Gold", PlanSecurity::Jwt)).unwrap();

        assert_eq!(json["type"], "API");
        assert_eq!(json["security"], "JWT");
        assert_eq!(json["status"], "STAGING");
    }
}
