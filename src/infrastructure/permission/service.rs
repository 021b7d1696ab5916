//! Permission checks
//!
//! Every management operation asks this service whether the current user holds a
//! permission on a reference. Organization administrators are always allowed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::api::{ApiId, ApiRepository};
use crate::domain::application::{ApplicationId, ApplicationRepository};
use crate::domain::membership::{Membership, MembershipReferenceType, MembershipRepository};
use crate::domain::role::{Actions, RoleKey, RolePermission, RoleRepository, RoleScope, ADMIN};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct PermissionService {
    memberships: Arc<dyn MembershipRepository>,
    roles: Arc<dyn RoleRepository>,
    apis: Arc<dyn ApiRepository>,
    applications: Arc<dyn ApplicationRepository>,
    organization_id: String,
    environment_id: String,
}

impl PermissionService {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        roles: Arc<dyn RoleRepository>,
        apis: Arc<dyn ApiRepository>,
        applications: Arc<dyn ApplicationRepository>,
        organization_id: impl Into<String>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            memberships,
            roles,
            apis,
            applications,
            organization_id: organization_id.into(),
            environment_id: environment_id.into(),
        }
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub async fn is_organization_admin(&self, user_id: &str) -> Result<bool, DomainError> {
        let admin = RoleKey::of(RoleScope::Organization, ADMIN);
        Ok(self
            .memberships
            .find_by_member(user_id, Some(MembershipReferenceType::Organization))
            .await?
            .iter()
            .any(|m| m.reference_id() == self.organization_id && m.role() == &admin))
    }

    pub async fn is_environment_admin(&self, user_id: &str) -> Result<bool, DomainError> {
        if self.is_organization_admin(user_id).await? {
            return Ok(true);
        }

        let admin = RoleKey::of(RoleScope::Environment, ADMIN);
        Ok(self
            .memberships
            .find_by_member(user_id, Some(MembershipReferenceType::Environment))
            .await?
            .iter()
            .any(|m| m.reference_id() == self.environment_id && m.role() == &admin))
    }

    /// Whether `user_id` may perform `actions` under `permission` on `reference_id`.
    ///
    /// Organization and environment permissions ignore `reference_id`.
    pub async fn has_permission(
        &self,
        user_id: &str,
        permission: RolePermission,
        reference_id: &str,
        actions: Actions,
    ) -> Result<bool, DomainError> {
        if self.is_organization_admin(user_id).await? {
            return Ok(true);
        }

        let roles = self
            .roles_for(user_id, permission.scope(), reference_id)
            .await?;

        for key in roles {
            if let Some(role) = self.roles.get(&key).await? {
                if role.grants(permission, actions) {
                    return Ok(true);
                }
            }
        }

        debug!(
            user = user_id,
            permission = ?permission,
            reference_id,
            actions = %actions,
            "Permission denied"
        );
        Ok(false)
    }

    pub async fn require_permission(
        &self,
        user_id: &str,
        permission: RolePermission,
        reference_id: &str,
        actions: Actions,
    ) -> Result<(), DomainError> {
        if self
            .has_permission(user_id, permission, reference_id, actions)
            .await?
        {
            Ok(())
        } else {
            Err(DomainError::forbidden_access())
        }
    }

    /// Organization and environment permissions of a user, merged across roles
    pub async fn environment_permissions(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<RolePermission, Actions>, DomainError> {
        let mut granted: BTreeMap<RolePermission, Actions> = BTreeMap::new();

        for scope in [RoleScope::Organization, RoleScope::Environment] {
            for key in self.roles_for(user_id, scope, "").await? {
                if let Some(role) = self.roles.get(&key).await? {
                    for (permission, actions) in role.permissions() {
                        let entry = granted.entry(*permission).or_default();
                        *entry = entry.union(*actions);
                    }
                }
            }
        }

        Ok(granted)
    }

    /// Role keys a user holds in `scope` on a reference, directly or through groups
    async fn roles_for(
        &self,
        user_id: &str,
        scope: RoleScope,
        reference_id: &str,
    ) -> Result<Vec<RoleKey>, DomainError> {
        let memberships = self.memberships.find_by_member(user_id, None).await?;

        let held = |reference_type: MembershipReferenceType, id: &str| -> Vec<RoleKey> {
            memberships
                .iter()
                .filter(|m| m.is_on(reference_type, id) && m.role_scope() == Some(scope))
                .map(|m| m.role().clone())
                .collect()
        };

        let roles = match scope {
            RoleScope::Organization => {
                held(MembershipReferenceType::Organization, &self.organization_id)
            }
            RoleScope::Environment => {
                held(MembershipReferenceType::Environment, &self.environment_id)
            }
            RoleScope::Group => held(MembershipReferenceType::Group, reference_id),
            RoleScope::Api => {
                let mut roles = held(MembershipReferenceType::Api, reference_id);
                if let Some(api) = self.apis.get(&ApiId::new(reference_id)).await? {
                    roles.extend(group_roles(&memberships, api.groups().iter(), scope));
                }
                roles
            }
            RoleScope::Application => {
                let mut roles = held(MembershipReferenceType::Application, reference_id);
                if let Some(application) = self
                    .applications
                    .get(&ApplicationId::new(reference_id))
                    .await?
                {
                    roles.extend(group_roles(&memberships, application.groups().iter(), scope));
                }
                roles
            }
        };

        Ok(roles)
    }
}

fn group_roles<'a>(
    memberships: &'a [Membership],
    groups: impl Iterator<Item = &'a String> + 'a,
    scope: RoleScope,
) -> impl Iterator<Item = RoleKey> + 'a {
    let groups: Vec<&String> = groups.collect();
    memberships
        .iter()
        .filter(move |m| {
            m.reference_type() == MembershipReferenceType::Group
                && groups.iter().any(|g| g.as_str() == m.reference_id())
                && m.role_scope() == Some(scope)
        })
        .map(|m| m.role().clone())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::domain::api::Api;
    use crate::domain::role::Role;
    use crate::infrastructure::api::StorageApiRepository;
    use crate::infrastructure::application::StorageApplicationRepository;
    use crate::infrastructure::membership::StorageMembershipRepository;
    use crate::infrastructure::role::StorageRoleRepository;
    use crate::infrastructure::storage::InMemoryStorage;

    struct Fixture {
        service: PermissionService,
        memberships: Arc<StorageMembershipRepository>,
        apis: Arc<StorageApiRepository>,
    }

    async fn fixture() -> Fixture {
        let roles = Arc::new(StorageRoleRepository::new(Arc::new(InMemoryStorage::new())));
        for role in Role::system_roles() {
            roles.create(role).await.unwrap();
        }
        let memberships = Arc::new(StorageMembershipRepository::new(Arc::new(
            InMemoryStorage::new(),
        )));
        let apis = Arc::new(StorageApiRepository::new(Arc::new(InMemoryStorage::new())));
        let applications = Arc::new(StorageApplicationRepository::new(Arc::new(
            InMemoryStorage::new(),
        )));

        Fixture {
            service: PermissionService::new(
                memberships.clone(),
                roles,
                apis.clone(),
                applications,
                "DEFAULT",
                "DEFAULT",
            ),
            memberships,
            apis,
        }
    }

    async fn grant(
        memberships: &StorageMembershipRepository,
        user: &str,
        reference_type: MembershipReferenceType,
        reference_id: &str,
        role: &str,
    ) {
        memberships
            .create(Membership::new(
                user,
                reference_type,
                reference_id,
                RoleKey::new(role),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_organization_admin_bypasses_checks() {
        let f = fixture().await;
        grant(&f.memberships, "admin", MembershipReferenceType::Organization, "DEFAULT", "ORGANIZATION:ADMIN").await;

        assert!(f
            .service
            .has_permission("admin", RolePermission::ApiPlan, "any-api", Actions::ALL)
            .await
            .unwrap());
        assert!(f.service.is_environment_admin("admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_environment_role() {
        let f = fixture().await;
        grant(&f.memberships, "u1", MembershipReferenceType::Environment, "DEFAULT", "ENVIRONMENT:USER").await;

        assert!(f
            .service
            .has_permission("u1", RolePermission::EnvironmentApplication, "", Actions::CREATE)
            .await
            .unwrap());
        assert!(!f
            .service
            .has_permission("u1", RolePermission::EnvironmentApi, "", Actions::CREATE)
            .await
            .unwrap());

        let err = f
            .service
            .require_permission("u1", RolePermission::EnvironmentGroup, "", Actions::DELETE)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_api_role_direct_and_through_group() {
        let f = fixture().await;
        let api = f
            .apis
            .create(
                Api::new("DEFAULT", "Echo", "1.0", "/echo")
                    .with_groups(BTreeSet::from(["g1".to_string()])),
            )
            .await
            .unwrap();
        let api_id = api.id().as_str();

        grant(&f.memberships, "direct", MembershipReferenceType::Api, api_id, "API:USER").await;
        grant(&f.memberships, "grouped", MembershipReferenceType::Group, "g1", "API:OWNER").await;
        grant(&f.memberships, "other", MembershipReferenceType::Group, "g2", "API:OWNER").await;

        assert!(f
            .service
            .has_permission("direct", RolePermission::ApiPlan, api_id, Actions::READ)
            .await
            .unwrap());
        assert!(!f
            .service
            .has_permission("direct", RolePermission::ApiPlan, api_id, Actions::UPDATE)
            .await
            .unwrap());
        assert!(f
            .service
            .has_permission("grouped", RolePermission::ApiPlan, api_id, Actions::UPDATE)
            .await
            .unwrap());
        assert!(!f
            .service
            .has_permission("other", RolePermission::ApiPlan, api_id, Actions::READ)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_environment_permissions_merge() {
        let f = fixture().await;
        grant(&f.memberships, "u1", MembershipReferenceType::Organization, "DEFAULT", "ORGANIZATION:USER").await;
        grant(&f.memberships, "u1", MembershipReferenceType::Environment, "DEFAULT", "ENVIRONMENT:USER").await;

        let permissions = f.service.environment_permissions("u1").await.unwrap();
        assert_eq!(
            permissions.get(&RolePermission::EnvironmentApplication),
            Some(&(Actions::CREATE | Actions::READ))
        );
    }
}
