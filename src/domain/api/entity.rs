//! Api entity and related types

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// Api identifier
    ApiId
);

/// Who can discover an API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PUBLIC" => Some(Self::Public),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Runtime state of an API on the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Started,
    #[default]
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "STARTED" => Some(Self::Started),
            "STOPPED" => Some(Self::Stopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication state of an API in the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiLifecycleState {
    #[default]
    Created,
    Published,
    Unpublished,
    Deprecated,
    Archived,
}

/// An API managed by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Api {
    id: ApiId,
    environment_id: String,
    name: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    context_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    #[serde(default)]
    visibility: Visibility,
    #[serde(default)]
    lifecycle_state: LifecycleState,
    #[serde(default)]
    api_lifecycle_state: ApiLifecycleState,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    categories: BTreeSet<String>,
    #[serde(default)]
    groups: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
    #[serde(default)]
    disable_membership_notifications: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(Api, id);

impl Api {
    /// Create a stopped, private API; `context_path` must already be normalized
    pub fn new(
        environment_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        context_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: ApiId::generate(),
            environment_id: environment_id.into(),
            name: name.into(),
            version: version.into(),
            description: None,
            context_path: context_path.into(),
            endpoint: None,
            visibility: Visibility::default(),
            lifecycle_state: LifecycleState::default(),
            api_lifecycle_state: ApiLifecycleState::default(),
            tags: BTreeSet::new(),
            labels: Vec::new(),
            categories: BTreeSet::new(),
            groups: BTreeSet::new(),
            picture: None,
            disable_membership_notifications: false,
            deployed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: ApiId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_groups(mut self, groups: BTreeSet<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    // Getters

    pub fn id(&self) -> &ApiId {
        &self.id
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle_state
    }

    pub fn api_lifecycle_state(&self) -> ApiLifecycleState {
        self.api_lifecycle_state
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn picture(&self) -> Option<&str> {
        self.picture.as_deref()
    }

    pub fn disable_membership_notifications(&self) -> bool {
        self.disable_membership_notifications
    }

    pub fn deployed_at(&self) -> Option<DateTime<Utc>> {
        self.deployed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle_state == LifecycleState::Started
    }

    /// The deployed definition is at least as recent as the last update
    pub fn is_synchronized(&self) -> bool {
        self.deployed_at
            .is_some_and(|deployed_at| deployed_at >= self.updated_at)
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn set_context_path(&mut self, context_path: impl Into<String>) {
        self.context_path = context_path.into();
        self.touch();
    }

    pub fn set_endpoint(&mut self, endpoint: Option<String>) {
        self.endpoint = endpoint;
        self.touch();
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
        self.touch();
    }

    pub fn set_api_lifecycle_state(&mut self, state: ApiLifecycleState) {
        self.api_lifecycle_state = state;
        self.touch();
    }

    pub fn set_tags(&mut self, tags: BTreeSet<String>) {
        self.tags = tags;
        self.touch();
    }

    pub fn set_labels(&mut self, labels: Vec<String>) {
        self.labels = labels;
        self.touch();
    }

    pub fn set_categories(&mut self, categories: BTreeSet<String>) {
        self.categories = categories;
        self.touch();
    }

    pub fn set_groups(&mut self, groups: BTreeSet<String>) {
        self.groups = groups;
        self.touch();
    }

    pub fn set_picture(&mut self, picture: Option<String>) {
        self.picture = picture;
        self.touch();
    }

    pub fn set_disable_membership_notifications(&mut self, disabled: bool) {
        self.disable_membership_notifications = disabled;
        self.touch();
    }

    /// Returns false when the group was already attached
    pub fn add_group(&mut self, group: impl Into<String>) -> bool {
        let added = self.groups.insert(group.into());
        if added {
            self.touch();
        }
        added
    }

    pub fn remove_group(&mut self, group: &str) -> bool {
        let removed = self.groups.remove(group);
        if removed {
            self.touch();
        }
        removed
    }

    /// Change the runtime state; deployment sync is unaffected
    pub fn set_lifecycle_state(&mut self, state: LifecycleState) {
        self.lifecycle_state = state;
    }

    pub fn mark_deployed(&mut self) {
        self.deployed_at = Some(Utc::now());
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Api {
    type Key = ApiId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Search filters for APIs
#[derive(Debug, Clone, Default)]
pub struct ApiCriteria {
    pub environment_id: Option<String>,
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    pub lifecycle_state: Option<LifecycleState>,
    pub tag: Option<String>,
    pub label: Option<String>,
    pub group: Option<String>,
    /// Restrict to these ids
    pub ids: Option<BTreeSet<String>>,
}

impl ApiCriteria {
    pub fn matches(&self, api: &Api) -> bool {
        if let Some(env) = &self.environment_id {
            if api.environment_id() != env {
                return false;
            }
        }

        if let Some(name) = &self.name {
            if !api.name().to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }

        if let Some(visibility) = self.visibility {
            if api.visibility() != visibility {
                return false;
            }
        }

        if let Some(state) = self.lifecycle_state {
            if api.lifecycle_state() != state {
                return false;
            }
        }

        if let Some(tag) = &self.tag {
            if !api.tags().contains(tag) {
                return false;
            }
        }

        if let Some(label) = &self.label {
            if !api.labels().iter().any(|l| l == label) {
                return false;
            }
        }

        if let Some(group) = &self.group {
            if !api.groups().contains(group) {
                return false;
            }
        }

        if let Some(ids) = &self.ids {
            if !ids.contains(api.id().as_str()) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> Api {
        Api::new("DEFAULT", "Store", "1.0", "/store")
    }

    #[test]
    fn test_defaults() {
        let api = api();

        assert_eq!(api.lifecycle_state(), LifecycleState::Stopped);
        assert_eq!(api.visibility(), Visibility::Private);
        assert_eq!(api.api_lifecycle_state(), ApiLifecycleState::Created);
        assert!(api.deployed_at().is_none());
        assert!(!api.is_synchronized());
    }

    #[test]
    fn test_lifecycle_does_not_touch_updated_at() {
        let mut api = api();
        let updated_at = api.updated_at();

        api.set_lifecycle_state(LifecycleState::Started);

        assert!(api.is_started());
        assert_eq!(api.updated_at(), updated_at);
    }

    #[test]
    fn test_synchronization() {
        let mut api = api();
        api.mark_deployed();
        assert!(api.is_synchronized());

        std::thread::sleep(std::time::Duration::from_millis(2));
        api.set_name("Store v2");
        assert!(!api.is_synchronized());
    }

    #[test]
    fn test_groups() {
        let mut api = api();
        assert!(api.add_group("g1"));
        assert!(!api.add_group("g1"));
        assert!(api.remove_group("g1"));
        assert!(api.groups().is_empty());
    }

    #[test]
    fn test_equality_by_id() {
        let api = api();
        let mut changed = api.clone();
        changed.set_name("Other");
        assert_eq!(api, changed);
    }

    #[test]
    fn test_criteria() {
        let api = api()
            .with_visibility(Visibility::Public)
            .with_tags(BTreeSet::from(["retail".to_string()]));

        let criteria = ApiCriteria {
            name: Some("sto".to_string()),
            visibility: Some(Visibility::Public),
            tag: Some("retail".to_string()),
            ..Default::default()
        };
        assert!(criteria.matches(&api));

        let criteria = ApiCriteria {
            lifecycle_state: Some(LifecycleState::Started),
            ..Default::default()
        };
        assert!(!criteria.matches(&api));
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(api()).unwrap();
        assert_eq!(json["lifecycle_state"], "STOPPED");
        assert_eq!(json["visibility"], "PRIVATE");
        assert_eq!(json["api_lifecycle_state"], "CREATED");
    }
}
