//! Permissions, role scopes and CRUD action sets

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Where a role applies
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleScope {
    Organization,
    Environment,
    Api,
    Application,
    Group,
}

impl RoleScope {
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
}

impl fmt::Display for RoleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission a role can grant, each bound to one scope
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolePermission {
    OrganizationUsers,
    OrganizationRole,
    EnvironmentApi,
    EnvironmentApplication,
    EnvironmentGroup,
    EnvironmentAudit,
    EnvironmentAlert,
    ApiDefinition,
    ApiPlan,
    ApiSubscription,
    ApiMember,
    ApiAlert,
    ApiAudit,
    ApplicationDefinition,
    ApplicationSubscription,
    ApplicationMember,
    ApplicationAlert,
    GroupMember,
}

impl RolePermission {
    pub const ALL: [RolePermission; 18] = [
        Self::OrganizationUsers,
        Self::OrganizationRole,
        Self::EnvironmentApi,
        Self::EnvironmentApplication,
        Self::EnvironmentGroup,
        Self::EnvironmentAudit,
        Self::EnvironmentAlert,
        Self::ApiDefinition,
        Self::ApiPlan,
        Self::ApiSubscription,
        Self::ApiMember,
        Self::ApiAlert,
        Self::ApiAudit,
        Self::ApplicationDefinition,
        Self::ApplicationSubscription,
        Self::ApplicationMember,
        Self::ApplicationAlert,
        Self::GroupMember,
    ];

    pub fn scope(&self) -> RoleScope {
        match self {
            Self::OrganizationUsers | Self::OrganizationRole => RoleScope::Organization,
            Self::EnvironmentApi
            | Self::EnvironmentApplication
            | Self::EnvironmentGroup
            | Self::EnvironmentAudit
            | Self::EnvironmentAlert => RoleScope::Environment,
            Self::ApiDefinition
            | Self::ApiPlan
            | Self::ApiSubscription
            | Self::ApiMember
            | Self::ApiAlert
            | Self::ApiAudit => RoleScope::Api,
            Self::ApplicationDefinition
            | Self::ApplicationSubscription
            | Self::ApplicationMember
            | Self::ApplicationAlert => RoleScope::Application,
            Self::GroupMember => RoleScope::Group,
        }
    }

    /// Every permission belonging to `scope`
    pub fn for_scope(scope: RoleScope) -> impl Iterator<Item = RolePermission> {
        Self::ALL.into_iter().filter(move |p| p.scope() == scope)
    }
}

/// CRUD action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    fn bit(self) -> u8 {
        match self {
            Self::Create => 0b0001,
            Self::Read => 0b0010,
            Self::Update => 0b0100,
            Self::Delete => 0b1000,
        }
    }

    fn letter(self) -> char {
        match self {
            Self::Create => 'C',
            Self::Read => 'R',
            Self::Update => 'U',
            Self::Delete => 'D',
        }
    }
}

/// A set of CRUD actions, written as a string like `"CRUD"` or `"R"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Actions(u8);

impl Actions {
    pub const NONE: Actions = Actions(0);
    pub const CREATE: Actions = Actions(0b0001);
    pub const READ: Actions = Actions(0b0010);
    pub const UPDATE: Actions = Actions(0b0100);
    pub const DELETE: Actions = Actions(0b1000);
    pub const ALL: Actions = Actions(0b1111);

    const ORDER: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn contains(&self, other: Actions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has(&self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: Actions) -> Actions {
        Actions(self.0 | other.0)
    }

    /// Parse a CRUD string; letters may come in any order and case
    pub fn parse(value: &str) -> Result<Self, String> {
        let mut bits = 0u8;

        for c in value.chars() {
            let action = match c.to_ascii_uppercase() {
                'C' => Action::Create,
                'R' => Action::Read,
                'U' => Action::Update,
                'D' => Action::Delete,
                other => return Err(format!("Unknown permission action '{}'", other)),
            };
            bits |= action.bit();
        }

        Ok(Actions(bits))
    }
}

impl std::ops::BitOr for Actions {
    type Output = Actions;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Display for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in Self::ORDER {
            if self.has(action) {
                write!(f, "{}", action.letter())?;
            }
        }
        Ok(())
    }
}

impl Serialize for Actions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Actions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Actions::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_scope() {
        assert_eq!(RolePermission::ApiPlan.scope(), RoleScope::Api);
        assert_eq!(
            RolePermission::EnvironmentGroup.scope(),
            RoleScope::Environment
        );
        assert_eq!(RolePermission::GroupMember.scope(), RoleScope::Group);
    }

    #[test]
    fn test_for_scope() {
        let api: Vec<_> = RolePermission::for_scope(RoleScope::Api).collect();
        assert_eq!(api.len(), 6);
        assert!(api.iter().all(|p| p.scope() == RoleScope::Api));
    }

    #[test]
    fn test_actions_parse_and_display() {
        let actions = Actions::parse("rc").unwrap();
        assert_eq!(actions.to_string(), "CR");
        assert_eq!(Actions::ALL.to_string(), "CRUD");
        assert_eq!(Actions::NONE.to_string(), "");
        assert!(Actions::parse("CRX").is_err());
    }

    #[test]
    fn test_actions_contains() {
        let granted = Actions::READ | Actions::UPDATE;

        assert!(granted.contains(Actions::READ));
        assert!(granted.contains(Actions::READ | Actions::UPDATE));
        assert!(!granted.contains(Actions::DELETE));
        assert!(granted.contains(Actions::NONE));
    }

    #[test]
    fn test_actions_serde() {
        let json = serde_json::to_string(&(Actions::CREATE | Actions::DELETE)).unwrap();
        assert_eq!(json, "\"CD\"");

        let parsed: Actions = serde_json::from_str("\"RU\"").unwrap();
        assert_eq!(parsed, Actions::READ | Actions::UPDATE);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(RoleScope::parse("api"), Some(RoleScope::Api));
        assert_eq!(RoleScope::parse("nope"), None);
        assert_eq!(
            serde_json::to_string(&RolePermission::ApiSubscription).unwrap(),
            "\"API_SUBSCRIPTION\""
        );
    }
}
