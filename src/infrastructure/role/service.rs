//! Role service

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::membership::MembershipRepository;
use crate::domain::role::{Actions, Role, RoleKey, RolePermission, RoleRepository, RoleScope};
use crate::domain::DomainError;
use crate::infrastructure::audit::AuditService;

/// Request for creating a custom role
#[derive(Debug, Clone, Default)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    pub default_role: bool,
    pub permissions: BTreeMap<RolePermission, Actions>,
}

/// Request for updating a role
#[derive(Debug, Clone, Default)]
pub struct UpdateRoleRequest {
    pub description: Option<String>,
    pub default_role: bool,
    pub permissions: BTreeMap<RolePermission, Actions>,
}

/// Role management
#[derive(Debug)]
pub struct RoleService {
    repository: Arc<dyn RoleRepository>,
    memberships: Arc<dyn MembershipRepository>,
    audit: Arc<AuditService>,
}

impl RoleService {
    pub fn new(
        repository: Arc<dyn RoleRepository>,
        memberships: Arc<dyn MembershipRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repository,
            memberships,
            audit,
        }
    }

    /// Create the system roles that do not exist yet
    pub async fn initialize(&self) -> Result<usize, DomainError> {
        let mut created = 0;

        for role in Role::system_roles() {
            if self.repository.get(role.id()).await?.is_none() {
                self.repository.create(role).await?;
                created += 1;
            }
        }

        if created > 0 {
            info!(created, "Initialized system roles");
        }

        Ok(created)
    }

    pub async fn find_by_scope(&self, scope: RoleScope) -> Result<Vec<Role>, DomainError> {
        self.repository.find_by_scope(scope).await
    }

    pub async fn find_by_id(&self, scope: RoleScope, name: &str) -> Result<Role, DomainError> {
        let key = RoleKey::of(scope, name);
        self.repository
            .get(&key)
            .await?
            .ok_or_else(|| DomainError::role_not_found(key.as_str()))
    }

    /// The role given to new members of a scope, if any
    pub async fn find_default(&self, scope: RoleScope) -> Result<Option<Role>, DomainError> {
        Ok(self
            .repository
            .find_by_scope(scope)
            .await?
            .into_iter()
            .find(Role::is_default))
    }

    pub async fn create(
        &self,
        scope: RoleScope,
        request: CreateRoleRequest,
        user: &str,
    ) -> Result<Role, DomainError> {
        let mut role = Role::new(scope, request.name)?;

        if role.is_primary_owner() {
            return Err(DomainError::validation(
                "The PRIMARY_OWNER role is reserved",
            ));
        }

        if self.repository.get(role.id()).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "Role [{}] already exists",
                role.id()
            )));
        }

        role.set_description(request.description);
        role.set_permissions(request.permissions)?;

        if request.default_role {
            self.clear_default(scope).await?;
            role.set_default(true);
        }

        let role = self.repository.create(role).await?;

        self.audit
            .create_organization_audit_log(
                user,
                AuditEvent::RoleCreated,
                BTreeMap::from([(AuditProperty::Role, role.id().to_string())]),
                changes(None, Some(&role)),
            )
            .await;

        Ok(role)
    }

    pub async fn update(
        &self,
        scope: RoleScope,
        name: &str,
        request: UpdateRoleRequest,
        user: &str,
    ) -> Result<Role, DomainError> {
        let previous = self.find_by_id(scope, name).await?;

        if previous.is_system() {
            return Err(DomainError::forbidden(format!(
                "System role [{}] can not be updated",
                previous.id()
            )));
        }

        let mut role = previous.clone();
        role.set_description(request.description);
        role.set_permissions(request.permissions)?;

        if request.default_role && !role.is_default() {
            self.clear_default(scope).await?;
        }
        role.set_default(request.default_role);

        let role = self.repository.update(role).await?;

        self.audit
            .create_organization_audit_log(
                user,
                AuditEvent::RoleUpdated,
                BTreeMap::from([(AuditProperty::Role, role.id().to_string())]),
                changes(Some(&previous), Some(&role)),
            )
            .await;

        Ok(role)
    }

    /// Delete a custom role, moving its members to the scope's default role
    pub async fn delete(&self, scope: RoleScope, name: &str, user: &str) -> Result<(), DomainError> {
        let role = self.find_by_id(scope, name).await?;

        if role.is_system() {
            return Err(DomainError::forbidden(format!(
                "System role [{}] can not be deleted",
                role.id()
            )));
        }

        if role.is_default() {
            return Err(DomainError::invalid_state(format!(
                "Default role [{}] can not be deleted",
                role.id()
            )));
        }

        let default_role = self.find_default(scope).await?;

        for mut membership in self.memberships.find_by_role(role.id()).await? {
            match &default_role {
                Some(default_role) => {
                    membership.set_role(default_role.id().clone());
                    self.memberships.update(membership).await?;
                }
                None => {
                    self.memberships.delete(membership.id()).await?;
                }
            }
        }

        self.repository.delete(role.id()).await?;

        self.audit
            .create_organization_audit_log(
                user,
                AuditEvent::RoleDeleted,
                BTreeMap::from([(AuditProperty::Role, role.id().to_string())]),
                changes(Some(&role), None),
            )
            .await;

        Ok(())
    }

    async fn clear_default(&self, scope: RoleScope) -> Result<(), DomainError> {
        for mut role in self.repository.find_by_scope(scope).await? {
            if role.is_default() {
                role.set_default(false);
                self.repository.update(role).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::{Membership, MembershipReferenceType};
    use crate::infrastructure::audit::StorageAuditRepository;
    use crate::infrastructure::membership::StorageMembershipRepository;
    use crate::infrastructure::role::StorageRoleRepository;
    use crate::infrastructure::storage::InMemoryStorage;

    async fn service() -> (RoleService, Arc<StorageMembershipRepository>) {
        let memberships = Arc::new(StorageMembershipRepository::new(Arc::new(
            InMemoryStorage::new(),
        )));
        let audit = Arc::new(AuditService::new(
            Arc::new(StorageAuditRepository::new(Arc::new(InMemoryStorage::new()))),
            "DEFAULT",
            "DEFAULT",
        ));
        let service = RoleService::new(
            Arc::new(StorageRoleRepository::new(Arc::new(InMemoryStorage::new()))),
            memberships.clone(),
            audit,
        );
        service.initialize().await.unwrap();
        (service, memberships)
    }

    fn request(name: &str) -> CreateRoleRequest {
        CreateRoleRequest {
            name: name.to_string(),
            permissions: BTreeMap::from([(RolePermission::ApiPlan, Actions::READ)]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (service, _) = service().await;
        assert_eq!(service.initialize().await.unwrap(), 0);
        assert_eq!(service.find_by_scope(RoleScope::Api).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_custom_role() {
        let (service, _) = service().await;

        let role = service
            .create(RoleScope::Api, request("reviewer"), "admin")
            .await
            .unwrap();
        assert_eq!(role.id().as_str(), "API:REVIEWER");

        let err = service
            .create(RoleScope::Api, request("REVIEWER"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_primary_owner_is_reserved() {
        let (service, _) = service().await;
        let err = service
            .create(RoleScope::Application, request("primary_owner"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_new_default_replaces_previous() {
        let (service, _) = service().await;

        let mut create = request("reader");
        create.default_role = true;
        service.create(RoleScope::Api, create, "admin").await.unwrap();

        let default = service.find_default(RoleScope::Api).await.unwrap().unwrap();
        assert_eq!(default.name(), "READER");
        let defaults = service
            .find_by_scope(RoleScope::Api)
            .await
            .unwrap()
            .into_iter()
            .filter(Role::is_default)
            .count();
        assert_eq!(defaults, 1);
    }

    #[tokio::test]
    async fn test_system_roles_are_immutable() {
        let (service, _) = service().await;

        let err = service
            .update(RoleScope::Api, "USER", UpdateRoleRequest::default(), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));

        let err = service.delete(RoleScope::Api, "OWNER", "admin").await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_delete_moves_members_to_default() {
        let (service, memberships) = service().await;
        let role = service
            .create(RoleScope::Api, request("reviewer"), "admin")
            .await
            .unwrap();

        memberships
            .create(Membership::new(
                "u1",
                MembershipReferenceType::Api,
                "api-1",
                role.id().clone(),
            ))
            .await
            .unwrap();

        service.delete(RoleScope::Api, "reviewer", "admin").await.unwrap();

        let held = memberships.find_by_member("u1", None).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].role().as_str(), "API:USER");
    }
}
