//! Group entity

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// Group identifier
    GroupId
);

/// Events on which a group is attached automatically
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupEventRule {
    ApiCreate,
    ApplicationCreate,
}

/// A set of users sharing roles on APIs and applications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    environment_id: String,
    name: String,
    #[serde(default)]
    event_rules: BTreeSet<GroupEventRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_invitation: Option<u32>,
    #[serde(default)]
    lock_api_role: bool,
    #[serde(default)]
    lock_application_role: bool,
    #[serde(default)]
    system_invitation: bool,
    #[serde(default)]
    email_invitation: bool,
    #[serde(default)]
    disable_membership_notifications: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(Group, id);

impl Group {
    pub fn new(environment_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id: GroupId::generate(),
            environment_id: environment_id.into(),
            name: name.into(),
            event_rules: BTreeSet::new(),
            max_invitation: None,
            lock_api_role: false,
            lock_application_role: false,
            system_invitation: false,
            email_invitation: false,
            disable_membership_notifications: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: GroupId) -> Self {
        self.id = id;
        self
    }

    pub fn with_event_rules(mut self, rules: BTreeSet<GroupEventRule>) -> Self {
        self.event_rules = rules;
        self
    }

    pub fn with_max_invitation(mut self, max: Option<u32>) -> Self {
        self.max_invitation = max;
        self
    }

    pub fn with_locked_roles(mut self, api: bool, application: bool) -> Self {
        self.lock_api_role = api;
        self.lock_application_role = application;
        self
    }

    // Getters

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_rules(&self) -> &BTreeSet<GroupEventRule> {
        &self.event_rules
    }

    pub fn has_event_rule(&self, rule: GroupEventRule) -> bool {
        self.event_rules.contains(&rule)
    }

    pub fn max_invitation(&self) -> Option<u32> {
        self.max_invitation
    }

    pub fn lock_api_role(&self) -> bool {
        self.lock_api_role
    }

    pub fn lock_application_role(&self) -> bool {
        self.lock_application_role
    }

    pub fn system_invitation(&self) -> bool {
        self.system_invitation
    }

    pub fn email_invitation(&self) -> bool {
        self.email_invitation
    }

    pub fn disable_membership_notifications(&self) -> bool {
        self.disable_membership_notifications
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_event_rules(&mut self, rules: BTreeSet<GroupEventRule>) {
        self.event_rules = rules;
        self.touch();
    }

    pub fn set_max_invitation(&mut self, max: Option<u32>) {
        self.max_invitation = max;
        self.touch();
    }

    pub fn set_locked_roles(&mut self, api: bool, application: bool) {
        self.lock_api_role = api;
        self.lock_application_role = application;
        self.touch();
    }

    pub fn set_invitations(&mut self, system: bool, email: bool) {
        self.system_invitation = system;
        self.email_invitation = email;
        self.touch();
    }

    pub fn set_disable_membership_notifications(&mut self, disabled: bool) {
        self.disable_membership_notifications = disabled;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Group {
    type Key = GroupId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_rules() {
        let group = Group::new("DEFAULT", "Developers")
            .with_event_rules(BTreeSet::from([GroupEventRule::ApiCreate]));

        assert!(group.has_event_rule(GroupEventRule::ApiCreate));
        assert!(!group.has_event_rule(GroupEventRule::ApplicationCreate));
    }

    #[test]
    fn test_serialization() {
        let group = Group::new("DEFAULT", "Developers")
            .with_event_rules(BTreeSet::from([GroupEventRule::ApplicationCreate]))
            .with_max_invitation(Some(5));

        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["event_rules"][0], "APPLICATION_CREATE");
        assert_eq!(json["max_invitation"], 5);

        let back: Group = serde_json::from_value(json).unwrap();
        assert_eq!(back, group);
    }
}
