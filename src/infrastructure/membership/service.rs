//! Membership service

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::membership::{Membership, MembershipReferenceType, MembershipRepository};
use crate::domain::role::{RoleKey, RoleRepository, RoleScope};
use crate::domain::user::{UserId, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::audit::AuditService;

/// A user holding roles on a reference
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role name per scope
    pub roles: BTreeMap<RoleScope, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// Role held in the scope the reference is normally managed with
    pub fn role(&self, scope: RoleScope) -> Option<&str> {
        self.roles.get(&scope).map(String::as_str)
    }
}

/// Attaches users to organizations, environments, APIs, applications and groups
#[derive(Debug)]
pub struct MembershipService {
    repository: Arc<dyn MembershipRepository>,
    roles: Arc<dyn RoleRepository>,
    users: Arc<dyn UserRepository>,
    audit: Arc<AuditService>,
}

impl MembershipService {
    pub fn new(
        repository: Arc<dyn MembershipRepository>,
        roles: Arc<dyn RoleRepository>,
        users: Arc<dyn UserRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repository,
            roles,
            users,
            audit,
        }
    }

    /// Give `member_id` a role on a reference, replacing the role it holds in the same scope.
    ///
    /// The primary owner role can only be given through ownership transfer.
    pub async fn add_role_to_member_on_reference(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
        member_id: &str,
        role: RoleKey,
        user: &str,
    ) -> Result<Membership, DomainError> {
        if role.is_primary_owner() {
            return Err(DomainError::validation(
                "Use ownership transfer to change the primary owner",
            ));
        }

        self.assign(reference_type, reference_id, member_id, role, user)
            .await
    }

    /// Make `member_id` the primary owner of a freshly created reference
    /// Fail unless `member_id` is a known user
    pub async fn ensure_member_exists(&self, member_id: &str) -> Result<(), DomainError> {
        match self.users.get(&UserId::new(member_id)).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::user_not_found(member_id)),
        }
    }

    pub async fn set_primary_owner(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
        member_id: &str,
    ) -> Result<Membership, DomainError> {
        let role = RoleKey::primary_owner(reference_type.default_scope());
        self.assign(reference_type, reference_id, member_id, role, member_id)
            .await
    }

    async fn assign(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
        member_id: &str,
        role: RoleKey,
        user: &str,
    ) -> Result<Membership, DomainError> {
        let scope = role
            .scope()
            .ok_or_else(|| DomainError::validation(format!("Invalid role [{}]", role)))?;

        let allowed = match reference_type {
            MembershipReferenceType::Group => matches!(
                scope,
                RoleScope::Api | RoleScope::Application | RoleScope::Group
            ),
            other => other.default_scope() == scope,
        };
        if !allowed {
            return Err(DomainError::validation(format!(
                "Role [{}] can not be used on {}",
                role, reference_type
            )));
        }

        if self.roles.get(&role).await?.is_none() {
            return Err(DomainError::role_not_found(role.as_str()));
        }

        self.ensure_member_exists(member_id).await?;

        let existing = self
            .repository
            .find_by_member(member_id, Some(reference_type))
            .await?
            .into_iter()
            .find(|m| m.is_on(reference_type, reference_id) && m.role_scope() == Some(scope));

        let membership = match existing {
            Some(mut membership) => {
                if membership.is_primary_owner() && !role.is_primary_owner() {
                    return Err(DomainError::invalid_state(
                        "The primary owner role can not be changed",
                    ));
                }
                if membership.role() == &role {
                    return Ok(membership);
                }
                let previous = membership.clone();
                membership.set_role(role);
                let membership = self.repository.update(membership).await?;
                self.record(AuditEvent::MembershipUpdated, &membership, Some(&previous), user)
                    .await;
                membership
            }
            None => {
                let membership = self
                    .repository
                    .create(Membership::new(member_id, reference_type, reference_id, role))
                    .await?;
                self.record(AuditEvent::MembershipCreated, &membership, None, user)
                    .await;
                membership
            }
        };

        debug!(
            member = member_id,
            reference = %reference_type,
            reference_id,
            role = %membership.role(),
            "Membership assigned"
        );

        Ok(membership)
    }

    /// Remove every role `member_id` holds on a reference
    pub async fn delete_member(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
        member_id: &str,
        user: &str,
    ) -> Result<(), DomainError> {
        let held: Vec<_> = self
            .repository
            .find_by_reference(reference_type, reference_id)
            .await?
            .into_iter()
            .filter(|m| m.member_id() == member_id)
            .collect();

        if held.is_empty() {
            return Err(DomainError::membership_not_found(member_id));
        }

        if held.iter().any(Membership::is_primary_owner) {
            return Err(DomainError::validation(
                "The primary owner can not be removed",
            ));
        }

        for membership in held {
            self.repository.delete(membership.id()).await?;
            self.record(AuditEvent::MembershipDeleted, &membership, Some(&membership), user)
                .await;
        }

        Ok(())
    }

    /// Drop all memberships of a reference being deleted
    pub async fn delete_reference(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
    ) -> Result<usize, DomainError> {
        let memberships = self
            .repository
            .find_by_reference(reference_type, reference_id)
            .await?;
        let count = memberships.len();

        for membership in memberships {
            self.repository.delete(membership.id()).await?;
        }

        Ok(count)
    }

    /// Drop all memberships of a member being deleted
    pub async fn delete_member_memberships(&self, member_id: &str) -> Result<usize, DomainError> {
        let memberships = self.repository.find_by_member(member_id, None).await?;
        let count = memberships.len();

        for membership in memberships {
            self.repository.delete(membership.id()).await?;
        }

        Ok(count)
    }

    /// Members of a reference with their roles, sorted by display name
    pub async fn get_members_by_reference(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
    ) -> Result<Vec<Member>, DomainError> {
        let memberships = self
            .repository
            .find_by_reference(reference_type, reference_id)
            .await?;

        let mut members: BTreeMap<String, Member> = BTreeMap::new();

        for membership in memberships {
            let Some((scope, name)) = membership.role().parts() else {
                continue;
            };

            if let Some(member) = members.get_mut(membership.member_id()) {
                member.roles.insert(scope, name.to_string());
                member.updated_at = member.updated_at.max(membership.updated_at());
                continue;
            }

            let Some(user) = self.users.get(&UserId::new(membership.member_id())).await? else {
                continue;
            };

            members.insert(
                membership.member_id().to_string(),
                Member {
                    id: user.id().to_string(),
                    username: user.username().to_string(),
                    display_name: user.display_name(),
                    email: user.email().map(str::to_string),
                    roles: BTreeMap::from([(scope, name.to_string())]),
                    created_at: membership.created_at(),
                    updated_at: membership.updated_at(),
                },
            );
        }

        let mut members: Vec<Member> = members.into_values().collect();
        members.sort_by_key(|m| m.display_name.to_lowercase());
        Ok(members)
    }

    /// One member of a reference
    pub async fn get_member(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
        member_id: &str,
    ) -> Result<Member, DomainError> {
        self.get_members_by_reference(reference_type, reference_id)
            .await?
            .into_iter()
            .find(|m| m.id == member_id)
            .ok_or_else(|| DomainError::membership_not_found(member_id))
    }

    pub async fn get_memberships_by_member(
        &self,
        member_id: &str,
        reference_type: Option<MembershipReferenceType>,
    ) -> Result<Vec<Membership>, DomainError> {
        self.repository.find_by_member(member_id, reference_type).await
    }

    /// Ids of the references of one type a member holds a role on
    pub async fn get_reference_ids_by_member(
        &self,
        member_id: &str,
        reference_type: MembershipReferenceType,
    ) -> Result<Vec<String>, DomainError> {
        let mut ids: Vec<String> = self
            .repository
            .find_by_member(member_id, Some(reference_type))
            .await?
            .into_iter()
            .map(|m| m.reference_id().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    pub async fn get_primary_owner(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
    ) -> Result<Membership, DomainError> {
        self.repository
            .find_by_reference(reference_type, reference_id)
            .await?
            .into_iter()
            .find(Membership::is_primary_owner)
            .ok_or_else(|| {
                DomainError::membership_not_found(format!("{} primary owner", reference_id))
            })
    }

    /// Hand the primary owner role to another user.
    ///
    /// The former owner keeps `former_owner_role` in the same scope, or the scope's
    /// OWNER role when none is given.
    pub async fn transfer_ownership(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
        new_owner_id: &str,
        former_owner_role: Option<&str>,
        user: &str,
    ) -> Result<(), DomainError> {
        let scope = reference_type.default_scope();
        let former_role = RoleKey::of(scope, former_owner_role.unwrap_or("OWNER"));

        if former_role.is_primary_owner() {
            return Err(DomainError::validation(
                "The former primary owner can not keep the primary owner role",
            ));
        }
        if self.roles.get(&former_role).await?.is_none() {
            return Err(DomainError::role_not_found(former_role.as_str()));
        }

        let mut current = self.get_primary_owner(reference_type, reference_id).await?;
        if current.member_id() == new_owner_id {
            return Err(DomainError::validation(
                "The user is already the primary owner",
            ));
        }
        if self.users.get(&UserId::new(new_owner_id)).await?.is_none() {
            return Err(DomainError::user_not_found(new_owner_id));
        }

        // the new owner's existing role in this scope is replaced
        for membership in self
            .repository
            .find_by_reference(reference_type, reference_id)
            .await?
        {
            if membership.member_id() == new_owner_id && membership.role_scope() == Some(scope) {
                self.repository.delete(membership.id()).await?;
            }
        }

        let previous = current.clone();
        current.set_role(former_role);
        let current = self.repository.update(current).await?;
        self.record(AuditEvent::MembershipUpdated, &current, Some(&previous), user)
            .await;

        let owner = self
            .repository
            .create(Membership::new(
                new_owner_id,
                reference_type,
                reference_id,
                RoleKey::primary_owner(scope),
            ))
            .await?;
        self.record(AuditEvent::MembershipCreated, &owner, None, user)
            .await;

        Ok(())
    }

    async fn record(
        &self,
        event: AuditEvent,
        membership: &Membership,
        previous: Option<&Membership>,
        user: &str,
    ) {
        let properties = BTreeMap::from([(AuditProperty::User, membership.member_id().to_string())]);
        let patch = if event == AuditEvent::MembershipDeleted {
            changes(previous, None)
        } else {
            changes(previous, Some(membership))
        };

        match membership.reference_type() {
            MembershipReferenceType::Api => {
                self.audit
                    .create_api_audit_log(membership.reference_id(), user, event, properties, patch)
                    .await
            }
            MembershipReferenceType::Application => {
                self.audit
                    .create_application_audit_log(
                        membership.reference_id(),
                        user,
                        event,
                        properties,
                        patch,
                    )
                    .await
            }
            MembershipReferenceType::Organization => {
                self.audit
                    .create_organization_audit_log(user, event, properties, patch)
                    .await
            }
            MembershipReferenceType::Environment | MembershipReferenceType::Group => {
                self.audit
                    .create_environment_audit_log(user, event, properties, patch)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::role::Role;
    use crate::domain::user::User;
    use crate::infrastructure::audit::StorageAuditRepository;
    use crate::infrastructure::membership::StorageMembershipRepository;
    use crate::infrastructure::role::StorageRoleRepository;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::user::StorageUserRepository;

    async fn service() -> MembershipService {
        let roles = Arc::new(StorageRoleRepository::new(Arc::new(InMemoryStorage::new())));
        for role in Role::system_roles() {
            roles.create(role).await.unwrap();
        }

        let users = Arc::new(StorageUserRepository::new(Arc::new(InMemoryStorage::new())));
        for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            users
                .create(User::new("DEFAULT", name).with_id(UserId::new(id)))
                .await
                .unwrap();
        }

        let audit = Arc::new(AuditService::new(
            Arc::new(StorageAuditRepository::new(Arc::new(InMemoryStorage::new()))),
            "DEFAULT",
            "DEFAULT",
        ));

        MembershipService::new(
            Arc::new(StorageMembershipRepository::new(Arc::new(InMemoryStorage::new()))),
            roles,
            users,
            audit,
        )
    }

    #[tokio::test]
    async fn test_add_role_replaces_role_in_same_scope() {
        let service = service().await;
        let api = MembershipReferenceType::Api;

        service
            .add_role_to_member_on_reference(api, "api-1", "u2", RoleKey::of(RoleScope::Api, "USER"), "u1")
            .await
            .unwrap();
        service
            .add_role_to_member_on_reference(api, "api-1", "u2", RoleKey::of(RoleScope::Api, "OWNER"), "u1")
            .await
            .unwrap();

        let members = service.get_members_by_reference(api, "api-1").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role(RoleScope::Api), Some("OWNER"));
    }

    #[tokio::test]
    async fn test_add_role_rejects_primary_owner_and_wrong_scope() {
        let service = service().await;
        let api = MembershipReferenceType::Api;

        let err = service
            .add_role_to_member_on_reference(api, "api-1", "u2", RoleKey::primary_owner(RoleScope::Api), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let err = service
            .add_role_to_member_on_reference(api, "api-1", "u2", RoleKey::of(RoleScope::Application, "USER"), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let err = service
            .add_role_to_member_on_reference(api, "api-1", "u2", RoleKey::of(RoleScope::Api, "NOPE"), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_group_members_hold_several_scopes() {
        let service = service().await;
        let group = MembershipReferenceType::Group;

        service
            .add_role_to_member_on_reference(group, "g1", "u2", RoleKey::of(RoleScope::Api, "OWNER"), "u1")
            .await
            .unwrap();
        service
            .add_role_to_member_on_reference(group, "g1", "u2", RoleKey::of(RoleScope::Application, "USER"), "u1")
            .await
            .unwrap();

        let member = service.get_member(group, "g1", "u2").await.unwrap();
        assert_eq!(member.roles.len(), 2);
        assert_eq!(member.role(RoleScope::Application), Some("USER"));
    }

    #[tokio::test]
    async fn test_primary_owner_can_not_be_removed() {
        let service = service().await;
        let api = MembershipReferenceType::Api;
        service.set_primary_owner(api, "api-1", "u1").await.unwrap();

        let err = service.delete_member(api, "api-1", "u1", "u1").await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let err = service.delete_member(api, "api-1", "u3", "u1").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_transfer_ownership() {
        let service = service().await;
        let app = MembershipReferenceType::Application;
        service.set_primary_owner(app, "app-1", "u1").await.unwrap();
        service
            .add_role_to_member_on_reference(app, "app-1", "u2", RoleKey::of(RoleScope::Application, "USER"), "u1")
            .await
            .unwrap();

        service
            .transfer_ownership(app, "app-1", "u2", Some("USER"), "u1")
            .await
            .unwrap();

        let owner = service.get_primary_owner(app, "app-1").await.unwrap();
        assert_eq!(owner.member_id(), "u2");

        let former = service.get_member(app, "app-1", "u1").await.unwrap();
        assert_eq!(former.role(RoleScope::Application), Some("USER"));

        let members = service.get_members_by_reference(app, "app-1").await.unwrap();
        assert_eq!(members.len(), 2);
    }
}
