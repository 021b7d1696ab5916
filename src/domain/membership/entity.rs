//! Membership entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::role::{RoleKey, RoleScope};
use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// Membership identifier
    MembershipId
);

/// What a membership is attached to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipReferenceType {
    Organization,
    Environment,
    Api,
    Application,
    Group,
}

impl MembershipReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "ORGANIZATION",
            Self::Environment => "ENVIRONMENT",
            Self::Api => "API",
            Self::Application => "APPLICATION",
            Self::Group => "GROUP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ORGANIZATION" => Some(Self::Organization),
            "ENVIRONMENT" => Some(Self::Environment),
            "API" => Some(Self::Api),
            "APPLICATION" => Some(Self::Application),
            "GROUP" => Some(Self::Group),
            _ => None,
        }
    }

    /// Scope of the roles a member normally holds on this kind of reference.
    /// Group memberships carry roles of several scopes.
    pub fn default_scope(&self) -> RoleScope {
        match self {
            Self::Organization => RoleScope::Organization,
            Self::Environment => RoleScope::Environment,
            Self::Api => RoleScope::Api,
            Self::Application => RoleScope::Application,
            Self::Group => RoleScope::Group,
        }
    }
}

impl std::fmt::Display for MembershipReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user holding a role on a reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    id: MembershipId,
    member_id: String,
    reference_type: MembershipReferenceType,
    reference_id: String,
    role: RoleKey,
    source: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(Membership, id);

impl Membership {
    pub fn new(
        member_id: impl Into<String>,
        reference_type: MembershipReferenceType,
        reference_id: impl Into<String>,
        role: RoleKey,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: MembershipId::generate(),
            member_id: member_id.into(),
            reference_type,
            reference_id: reference_id.into(),
            role,
            source: "system".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    // Getters

    pub fn id(&self) -> &MembershipId {
        &self.id
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn reference_type(&self) -> MembershipReferenceType {
        self.reference_type
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn role(&self) -> &RoleKey {
        &self.role
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn role_scope(&self) -> Option<RoleScope> {
        self.role.scope()
    }

    pub fn is_primary_owner(&self) -> bool {
        self.role.is_primary_owner()
    }

    pub fn is_on(&self, reference_type: MembershipReferenceType, reference_id: &str) -> bool {
        self.reference_type == reference_type && self.reference_id == reference_id
    }

    // Mutators

    pub fn set_role(&mut self, role: RoleKey) {
        self.role = role;
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Membership {
    type Key = MembershipId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_membership() {
        let membership = Membership::new(
            "user-1",
            MembershipReferenceType::Api,
            "api-1",
            RoleKey::primary_owner(RoleScope::Api),
        );

        assert_eq!(membership.member_id(), "user-1");
        assert!(membership.is_on(MembershipReferenceType::Api, "api-1"));
        assert!(!membership.is_on(MembershipReferenceType::Application, "api-1"));
        assert!(membership.is_primary_owner());
        assert_eq!(membership.role_scope(), Some(RoleScope::Api));
        assert_eq!(membership.source(), "system");
    }

    #[test]
    fn test_set_role() {
        let mut membership = Membership::new(
            "user-1",
            MembershipReferenceType::Group,
            "group-1",
            RoleKey::of(RoleScope::Api, "USER"),
        );

        membership.set_role(RoleKey::of(RoleScope::Api, "OWNER"));
        assert_eq!(membership.role().as_str(), "API:OWNER");
        assert!(membership.updated_at() >= membership.created_at());
    }

    #[test]
    fn test_reference_type_parse() {
        assert_eq!(
            MembershipReferenceType::parse("application"),
            Some(MembershipReferenceType::Application)
        );
        assert_eq!(MembershipReferenceType::parse("team"), None);
        assert_eq!(
            MembershipReferenceType::Group.default_scope(),
            RoleScope::Group
        );
    }

    #[test]
    fn test_membership_serialization() {
        let membership = Membership::new(
            "user-1",
            MembershipReferenceType::Environment,
            "DEFAULT",
            RoleKey::of(RoleScope::Environment, "USER"),
        );

        let json = serde_json::to_value(&membership).unwrap();
        assert_eq!(json["reference_type"], "ENVIRONMENT");
        assert_eq!(json["role"], "ENVIRONMENT:USER");
        assert_eq!(json["member_id"], "user-1");
    }
}
