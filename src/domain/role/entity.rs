//! Role entity

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::permission::{Actions, RolePermission, RoleScope};
use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

crate::entity_id!(
    /// Role identifier, rendered as `SCOPE:NAME`
    RoleKey
);

pub const ADMIN: &str = "ADMIN";
pub const USER: &str = "USER";
pub const OWNER: &str = "OWNER";
pub const PRIMARY_OWNER: &str = "PRIMARY_OWNER";

impl RoleKey {
    pub fn of(scope: RoleScope, name: &str) -> Self {
        Self::new(format!("{}:{}", scope, name.to_ascii_uppercase()))
    }

    pub fn primary_owner(scope: RoleScope) -> Self {
        Self::of(scope, PRIMARY_OWNER)
    }

    /// Split the key into its scope and role name
    pub fn parts(&self) -> Option<(RoleScope, &str)> {
        let (scope, name) = self.as_str().split_once(':')?;
        Some((RoleScope::parse(scope)?, name))
    }

    pub fn scope(&self) -> Option<RoleScope> {
        self.parts().map(|(scope, _)| scope)
    }

    pub fn is_primary_owner(&self) -> bool {
        matches!(self.parts(), Some((_, PRIMARY_OWNER)))
    }
}

/// A named set of permissions within one scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    id: RoleKey,
    scope: RoleScope,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    default_role: bool,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    permissions: BTreeMap<RolePermission, Actions>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(Role, id);

impl Role {
    /// Create a custom role; the name is upper-cased
    pub fn new(scope: RoleScope, name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into().trim().to_ascii_uppercase();

        if name.is_empty() {
            return Err(DomainError::validation("Role name cannot be empty"));
        }

        if name.contains(':') {
            return Err(DomainError::validation("Role name cannot contain ':'"));
        }

        let now = Utc::now();

        Ok(Self {
            id: RoleKey::of(scope, &name),
            scope,
            name,
            description: None,
            default_role: false,
            system: false,
            permissions: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_permission(mut self, permission: RolePermission, actions: Actions) -> Self {
        self.grant(permission, actions);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default_role = true;
        self
    }

    fn system(scope: RoleScope, name: &str, description: &str) -> Self {
        let now = Utc::now();

        Self {
            id: RoleKey::of(scope, name),
            scope,
            name: name.to_string(),
            description: Some(description.to_string()),
            default_role: false,
            system: true,
            permissions: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn with_all_permissions(mut self) -> Self {
        for permission in RolePermission::for_scope(self.scope) {
            self.permissions.insert(permission, Actions::ALL);
        }
        self
    }

    /// The roles every installation starts with
    pub fn system_roles() -> Vec<Role> {
        vec![
            Self::system(RoleScope::Organization, ADMIN, "Organization administrator")
                .with_all_permissions(),
            Self::system(RoleScope::Organization, USER, "Default organization role").as_default(),
            Self::system(RoleScope::Environment, ADMIN, "Environment administrator")
                .with_all_permissions(),
            Self::system(RoleScope::Environment, USER, "Default environment role")
                .as_default()
                .with_permission(RolePermission::EnvironmentApi, Actions::READ)
                .with_permission(
                    RolePermission::EnvironmentApplication,
                    Actions::CREATE | Actions::READ,
                )
                .with_permission(RolePermission::EnvironmentGroup, Actions::READ),
            Self::system(RoleScope::Api, PRIMARY_OWNER, "API primary owner")
                .with_all_permissions(),
            Self::system(RoleScope::Api, OWNER, "API owner")
                .with_all_permissions()
                .with_permission(RolePermission::ApiDefinition, Actions::READ | Actions::UPDATE),
            Self::system(RoleScope::Api, USER, "API user")
                .as_default()
                .with_permission(RolePermission::ApiDefinition, Actions::READ)
                .with_permission(RolePermission::ApiPlan, Actions::READ)
                .with_permission(RolePermission::ApiMember, Actions::READ),
            Self::system(RoleScope::Application, PRIMARY_OWNER, "Application primary owner")
                .with_all_permissions(),
            Self::system(RoleScope::Application, OWNER, "Application owner")
                .with_all_permissions()
                .with_permission(
                    RolePermission::ApplicationDefinition,
                    Actions::READ | Actions::UPDATE,
                ),
            Self::system(RoleScope::Application, USER, "Application user")
                .as_default()
                .with_permission(RolePermission::ApplicationDefinition, Actions::READ)
                .with_permission(RolePermission::ApplicationSubscription, Actions::READ)
                .with_permission(RolePermission::ApplicationMember, Actions::READ),
            Self::system(RoleScope::Group, ADMIN, "Group administrator").with_all_permissions(),
        ]
    }

    // Getters

    pub fn id(&self) -> &RoleKey {
        &self.id
    }

    pub fn scope(&self) -> RoleScope {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.default_role
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub fn is_primary_owner(&self) -> bool {
        self.name == PRIMARY_OWNER
    }

    pub fn permissions(&self) -> &BTreeMap<RolePermission, Actions> {
        &self.permissions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Actions this role grants for `permission`
    pub fn actions_for(&self, permission: RolePermission) -> Actions {
        self.permissions
            .get(&permission)
            .copied()
            .unwrap_or(Actions::NONE)
    }

    pub fn grants(&self, permission: RolePermission, actions: Actions) -> bool {
        self.actions_for(permission).contains(actions)
    }

    // Mutators

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn set_default(&mut self, default_role: bool) {
        self.default_role = default_role;
        self.touch();
    }

    /// Replace the permission map; permissions from other scopes are rejected
    pub fn set_permissions(
        &mut self,
        permissions: BTreeMap<RolePermission, Actions>,
    ) -> Result<(), DomainError> {
        if let Some(foreign) = permissions.keys().find(|p| p.scope() != self.scope) {
            return Err(DomainError::validation(format!(
                "Permission {:?} does not belong to scope {}",
                foreign, self.scope
            )));
        }

        self.permissions = permissions
            .into_iter()
            .filter(|(_, actions)| !actions.is_empty())
            .collect();
        self.touch();
        Ok(())
    }

    fn grant(&mut self, permission: RolePermission, actions: Actions) {
        if permission.scope() == self.scope {
            self.permissions.insert(permission, actions);
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Role {
    type Key = RoleKey;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_key_format() {
        let key = RoleKey::of(RoleScope::Api, "owner");
        assert_eq!(key.as_str(), "API:OWNER");
        assert_eq!(key.parts(), Some((RoleScope::Api, "OWNER")));
        assert!(!key.is_primary_owner());
        assert!(RoleKey::primary_owner(RoleScope::Application).is_primary_owner());
    }

    #[test]
    fn test_role_key_invalid() {
        assert_eq!(RoleKey::new("garbage").parts(), None);
        assert_eq!(RoleKey::new("NOPE:USER").scope(), None);
    }

    #[test]
    fn test_new_role_uppercases_name() {
        let role = Role::new(RoleScope::Api, " reviewer ").unwrap();
        assert_eq!(role.name(), "REVIEWER");
        assert_eq!(role.id().as_str(), "API:REVIEWER");
        assert!(!role.is_system());
        assert!(!role.is_default());
    }

    #[test]
    fn test_new_role_rejects_empty_name() {
        assert!(Role::new(RoleScope::Api, "  ").is_err());
        assert!(Role::new(RoleScope::Api, "a:b").is_err());
    }

    #[test]
    fn test_system_roles() {
        let roles = Role::system_roles();
        assert_eq!(roles.len(), 11);
        assert!(roles.iter().all(Role::is_system));

        let env_user = roles
            .iter()
            .find(|r| r.id().as_str() == "ENVIRONMENT:USER")
            .unwrap();
        assert!(env_user.is_default());
        assert!(env_user.grants(RolePermission::EnvironmentApplication, Actions::CREATE));
        assert!(!env_user.grants(RolePermission::EnvironmentApi, Actions::CREATE));

        let api_owner = roles
            .iter()
            .find(|r| r.id().as_str() == "API:OWNER")
            .unwrap();
        assert!(api_owner.grants(RolePermission::ApiPlan, Actions::ALL));
        assert!(!api_owner.grants(RolePermission::ApiDefinition, Actions::DELETE));
    }

    #[test]
    fn test_exactly_one_default_per_scope() {
        let roles = Role::system_roles();

        for scope in [
            RoleScope::Organization,
            RoleScope::Environment,
            RoleScope::Api,
            RoleScope::Application,
        ] {
            let defaults = roles
                .iter()
                .filter(|r| r.scope() == scope && r.is_default())
                .count();
            assert_eq!(defaults, 1, "scope {}", scope);
        }
    }

    #[test]
    fn test_set_permissions_rejects_foreign_scope() {
        let mut role = Role::new(RoleScope::Api, "custom").unwrap();
        let mut permissions = BTreeMap::new();
        permissions.insert(RolePermission::ApplicationDefinition, Actions::READ);

        assert!(role.set_permissions(permissions).is_err());
    }

    #[test]
    fn test_set_permissions_drops_empty_entries() {
        let mut role = Role::new(RoleScope::Api, "custom").unwrap();
        let mut permissions = BTreeMap::new();
        permissions.insert(RolePermission::ApiPlan, Actions::READ);
        permissions.insert(RolePermission::ApiMember, Actions::NONE);

        role.set_permissions(permissions).unwrap();
        assert_eq!(role.permissions().len(), 1);
    }

    #[test]
    fn test_role_serialization_roundtrip() {
        let role = Role::new(RoleScope::Api, "custom")
            .unwrap()
            .with_permission(RolePermission::ApiPlan, Actions::READ | Actions::UPDATE);

        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["permissions"]["API_PLAN"], "RU");

        let back: Role = serde_json::from_value(json).unwrap();
        assert_eq!(back.actions_for(RolePermission::ApiPlan), Actions::READ | Actions::UPDATE);
    }
}
