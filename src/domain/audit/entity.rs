//! Audit entity and events

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patch::PatchOperation;
use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// Audit identifier
    AuditId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditReferenceType {
    Organization,
    Environment,
    Api,
    Application,
}

impl AuditReferenceType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ORGANIZATION" => Some(Self::Organization),
            "ENVIRONMENT" => Some(Self::Environment),
            "API" => Some(Self::Api),
            "APPLICATION" => Some(Self::Application),
            _ => None,
        }
    }
}

macro_rules! audit_events {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Something worth recording happened
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum AuditEvent {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl AuditEvent {
            pub const ALL: &'static [AuditEvent] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

audit_events! {
    ApiCreated => "API_CREATED",
    ApiUpdated => "API_UPDATED",
    ApiDeleted => "API_DELETED",
    ApiStarted => "API_STARTED",
    ApiStopped => "API_STOPPED",
    ApiDeployed => "API_DEPLOYED",
    PlanCreated => "PLAN_CREATED",
    PlanUpdated => "PLAN_UPDATED",
    PlanDeleted => "PLAN_DELETED",
    PlanPublished => "PLAN_PUBLISHED",
    PlanDeprecated => "PLAN_DEPRECATED",
    PlanClosed => "PLAN_CLOSED",
    SubscriptionCreated => "SUBSCRIPTION_CREATED",
    SubscriptionUpdated => "SUBSCRIPTION_UPDATED",
    SubscriptionClosed => "SUBSCRIPTION_CLOSED",
    SubscriptionPaused => "SUBSCRIPTION_PAUSED",
    SubscriptionResumed => "SUBSCRIPTION_RESUMED",
    SubscriptionTransferred => "SUBSCRIPTION_TRANSFERRED",
    SubscriptionDeleted => "SUBSCRIPTION_DELETED",
    ApiKeyCreated => "APIKEY_CREATED",
    ApiKeyRenewed => "APIKEY_RENEWED",
    ApiKeyRevoked => "APIKEY_REVOKED",
    ApiKeyReactivated => "APIKEY_REACTIVATED",
    ApplicationCreated => "APPLICATION_CREATED",
    ApplicationUpdated => "APPLICATION_UPDATED",
    ApplicationArchived => "APPLICATION_ARCHIVED",
    ClientSecretRenewed => "CLIENT_SECRET_RENEWED",
    MembershipCreated => "MEMBERSHIP_CREATED",
    MembershipUpdated => "MEMBERSHIP_UPDATED",
    MembershipDeleted => "MEMBERSHIP_DELETED",
    GroupCreated => "GROUP_CREATED",
    GroupUpdated => "GROUP_UPDATED",
    GroupDeleted => "GROUP_DELETED",
    RoleCreated => "ROLE_CREATED",
    RoleUpdated => "ROLE_UPDATED",
    RoleDeleted => "ROLE_DELETED",
    UserCreated => "USER_CREATED",
    UserUpdated => "USER_UPDATED",
    UserDeleted => "USER_DELETED",
    UserConnected => "USER_CONNECTED",
    PasswordChanged => "PASSWORD_CHANGED",
    AlertTriggerCreated => "ALERT_TRIGGER_CREATED",
    AlertTriggerUpdated => "ALERT_TRIGGER_UPDATED",
    AlertTriggerDeleted => "ALERT_TRIGGER_DELETED",
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of an audit property, e.g. `PLAN`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditProperty {
    Api,
    Application,
    Plan,
    Subscription,
    ApiKey,
    User,
    Group,
    Role,
    AlertTrigger,
}

/// An immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    id: AuditId,
    organization_id: String,
    environment_id: String,
    reference_type: AuditReferenceType,
    reference_id: String,
    user: String,
    event: AuditEvent,
    #[serde(default)]
    properties: BTreeMap<AuditProperty, String>,
    #[serde(default)]
    patch: Vec<PatchOperation>,
    created_at: DateTime<Utc>,
}

crate::identity_eq!(Audit, id);

impl Audit {
    pub fn new(
        organization_id: impl Into<String>,
        environment_id: impl Into<String>,
        reference_type: AuditReferenceType,
        reference_id: impl Into<String>,
        user: impl Into<String>,
        event: AuditEvent,
    ) -> Self {
        Self {
            id: AuditId::generate(),
            organization_id: organization_id.into(),
            environment_id: environment_id.into(),
            reference_type,
            reference_id: reference_id.into(),
            user: user.into(),
            event,
            properties: BTreeMap::new(),
            patch: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_properties(mut self, properties: BTreeMap<AuditProperty, String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_patch(mut self, patch: Vec<PatchOperation>) -> Self {
        self.patch = patch;
        self
    }

    pub fn id(&self) -> &AuditId {
        &self.id
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn reference_type(&self) -> AuditReferenceType {
        self.reference_type
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn event(&self) -> AuditEvent {
        self.event
    }

    pub fn properties(&self) -> &BTreeMap<AuditProperty, String> {
        &self.properties
    }

    pub fn patch(&self) -> &[PatchOperation] {
        &self.patch
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl StorageEntity for Audit {
    type Key = AuditId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Audit search filters
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub reference_type: Option<AuditReferenceType>,
    pub reference_ids: Vec<String>,
    pub events: Vec<AuditEvent>,
    pub user: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn matches(&self, audit: &Audit) -> bool {
        self.reference_type
            .is_none_or(|reference_type| audit.reference_type() == reference_type)
            && (self.reference_ids.is_empty()
                || self.reference_ids.iter().any(|id| id == audit.reference_id()))
            && (self.events.is_empty() || self.events.contains(&audit.event()))
            && self.user.as_deref().is_none_or(|user| audit.user() == user)
            && self.from.is_none_or(|from| audit.created_at() >= from)
            && self.to.is_none_or(|to| audit.created_at() <= to)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn audit(event: AuditEvent) -> Audit {
        Audit::new(
            "DEFAULT",
            "DEFAULT",
            AuditReferenceType::Api,
            "api-1",
            "user-1",
            event,
        )
    }

    #[test]
    fn test_event_names() {
        assert_eq!(AuditEvent::ApiKeyRevoked.as_str(), "APIKEY_REVOKED");
        assert_eq!(AuditEvent::parse("PLAN_CLOSED"), Some(AuditEvent::PlanClosed));
        assert_eq!(AuditEvent::parse("NOPE"), None);
        assert!(AuditEvent::ALL.contains(&AuditEvent::GroupDeleted));
        assert_eq!(
            serde_json::to_string(&AuditEvent::ApiCreated).unwrap(),
            "\"API_CREATED\""
        );
    }

    #[test]
    fn test_query_matches() {
        let audit = audit(AuditEvent::ApiCreated);

        assert!(AuditQuery::default().matches(&audit));
        assert!(AuditQuery {
            reference_type: Some(AuditReferenceType::Api),
            reference_ids: vec!["api-1".into()],
            events: vec![AuditEvent::ApiCreated],
            user: Some("user-1".into()),
            ..Default::default()
        }
        .matches(&audit));
        assert!(!AuditQuery {
            events: vec![AuditEvent::ApiDeleted],
            ..Default::default()
        }
        .matches(&audit));
    }

    #[test]
    fn test_query_time_window() {
        let audit = audit(AuditEvent::ApiUpdated);
        let now = Utc::now();

        assert!(AuditQuery {
            from: Some(now - Duration::minutes(1)),
            to: Some(now + Duration::minutes(1)),
            ..Default::default()
        }
        .matches(&audit));
        assert!(!AuditQuery {
            from: Some(now + Duration::minutes(1)),
            ..Default::default()
        }
        .matches(&audit));
    }

    #[test]
    fn test_properties_serialize_as_upper_case() {
        let audit = audit(AuditEvent::PlanCreated)
            .with_properties(BTreeMap::from([(AuditProperty::Plan, "plan-1".to_string())]));

        let json = serde_json::to_value(&audit).unwrap();
        assert_eq!(json["properties"]["PLAN"], "plan-1");
    }
}
