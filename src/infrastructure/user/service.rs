//! User service for authentication and user management

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::membership::MembershipReferenceType;
use crate::domain::role::{RoleKey, RoleRepository, RoleScope, ADMIN};
use crate::domain::user::{
    validate_email, validate_password, validate_username, User, UserId, UserRepository,
    UserStatus,
};
use crate::domain::{DomainError, Page, Pageable};
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::membership::MembershipService;

use super::password::PasswordHasher;

/// Request for creating a new user
#[derive(Debug, Clone, Default)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Request for updating a user's profile
#[derive(Debug, Clone, Default)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub status: Option<UserStatus>,
}

/// Request for changing a user's password
#[derive(Debug, Clone)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Organization and environment role names to give a user
#[derive(Debug, Clone, Default)]
pub struct UpdateUserRolesRequest {
    pub organization_role: Option<String>,
    pub environment_role: Option<String>,
}

/// User service for authentication and management
#[derive(Debug)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    memberships: Arc<MembershipService>,
    hasher: Arc<dyn PasswordHasher>,
    audit: Arc<AuditService>,
    organization_id: String,
    environment_id: String,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        memberships: Arc<MembershipService>,
        hasher: Arc<dyn PasswordHasher>,
        audit: Arc<AuditService>,
        organization_id: impl Into<String>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            roles,
            memberships,
            hasher,
            audit,
            organization_id: organization_id.into(),
            environment_id: environment_id.into(),
        }
    }

    /// Create a user holding the default organization and environment roles
    pub async fn create(&self, request: CreateUserRequest, by: &str) -> Result<User, DomainError> {
        validate_username(&request.username).map_err(|e| DomainError::validation(e.to_string()))?;

        if let Some(email) = &request.email {
            validate_email(email).map_err(|e| DomainError::validation(e.to_string()))?;
            if self.repository.get_by_email(email).await?.is_some() {
                return Err(DomainError::conflict(format!(
                    "A user with email [{}] already exists",
                    email
                )));
            }
        }

        if self
            .repository
            .get_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(format!(
                "A user with username [{}] already exists",
                request.username
            )));
        }

        let mut user = User::new(&self.organization_id, &request.username)
            .with_names(request.first_name, request.last_name);

        if let Some(email) = request.email {
            user = user.with_email(email);
        }

        if let Some(password) = &request.password {
            validate_password(password).map_err(|e| DomainError::validation(e.to_string()))?;
            user = user.with_password_hash(self.hasher.hash(password)?);
        }

        let user = self.repository.create(user).await?;

        self.assign_default_roles(user.id().as_str()).await?;

        info!(user_id = %user.id(), username = user.username(), "User created");

        self.audit
            .create_organization_audit_log(
                by,
                AuditEvent::UserCreated,
                BTreeMap::from([(AuditProperty::User, user.id().to_string())]),
                changes(None, Some(&user)),
            )
            .await;

        Ok(user)
    }

    /// Create the first administrator unless users already exist
    pub async fn initialize_admin(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
    ) -> Result<Option<User>, DomainError> {
        if self.repository.count().await? > 0 {
            return Ok(None);
        }

        let user = self
            .create(
                CreateUserRequest {
                    username: username.to_string(),
                    email,
                    password: Some(password.to_string()),
                    ..Default::default()
                },
                "system",
            )
            .await?;

        self.update_roles(
            user.id().as_str(),
            UpdateUserRolesRequest {
                organization_role: Some(ADMIN.to_string()),
                environment_role: Some(ADMIN.to_string()),
            },
            "system",
        )
        .await?;

        info!(username, "Created initial administrator");
        Ok(Some(user))
    }

    async fn assign_default_roles(&self, user_id: &str) -> Result<(), DomainError> {
        for (scope, reference_type, reference_id) in [
            (
                RoleScope::Organization,
                MembershipReferenceType::Organization,
                &self.organization_id,
            ),
            (
                RoleScope::Environment,
                MembershipReferenceType::Environment,
                &self.environment_id,
            ),
        ] {
            let default = self
                .roles
                .find_by_scope(scope)
                .await?
                .into_iter()
                .find(|r| r.is_default());

            if let Some(role) = default {
                self.memberships
                    .add_role_to_member_on_reference(
                        reference_type,
                        reference_id,
                        user_id,
                        role.id().clone(),
                        "system",
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Replace the user's organization and/or environment role
    pub async fn update_roles(
        &self,
        id: &str,
        request: UpdateUserRolesRequest,
        by: &str,
    ) -> Result<(), DomainError> {
        let user = self.find_by_id(id).await?;

        if let Some(role) = request.organization_role {
            self.memberships
                .add_role_to_member_on_reference(
                    MembershipReferenceType::Organization,
                    &self.organization_id,
                    user.id().as_str(),
                    RoleKey::of(RoleScope::Organization, &role),
                    by,
                )
                .await?;
        }

        if let Some(role) = request.environment_role {
            self.memberships
                .add_role_to_member_on_reference(
                    MembershipReferenceType::Environment,
                    &self.environment_id,
                    user.id().as_str(),
                    RoleKey::of(RoleScope::Environment, &role),
                    by,
                )
                .await?;
        }

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<User, DomainError> {
        self.repository
            .get(&UserId::new(id))
            .await?
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, DomainError> {
        self.repository
            .get_by_username(username)
            .await?
            .ok_or_else(|| DomainError::user_not_found(username))
    }

    /// Non-archived users whose username, name or email contains `query`
    pub async fn search(
        &self,
        query: Option<&str>,
        pageable: Pageable,
    ) -> Result<Page<User>, DomainError> {
        let query = query.map(str::to_lowercase);

        let users: Vec<User> = self
            .repository
            .list()
            .await?
            .into_iter()
            .filter(|u| u.status() != UserStatus::Archived)
            .filter(|u| {
                query.as_deref().is_none_or(|q| {
                    u.username().to_lowercase().contains(q)
                        || u.display_name().to_lowercase().contains(q)
                        || u.email().is_some_and(|e| e.to_lowercase().contains(q))
                })
            })
            .collect();

        Ok(Page::of(users, pageable))
    }

    pub async fn update(
        &self,
        id: &str,
        request: UpdateUserRequest,
        by: &str,
    ) -> Result<User, DomainError> {
        let previous = self.find_by_id(id).await?;
        let mut user = previous.clone();

        if let Some(email) = request.email {
            validate_email(&email).map_err(|e| DomainError::validation(e.to_string()))?;
            if let Some(other) = self.repository.get_by_email(&email).await? {
                if other.id() != user.id() {
                    return Err(DomainError::conflict(format!(
                        "A user with email [{}] already exists",
                        email
                    )));
                }
            }
            user.set_email(Some(email));
        }

        if request.first_name.is_some() || request.last_name.is_some() {
            user.set_names(
                request.first_name.or_else(|| previous.first_name().map(str::to_string)),
                request.last_name.or_else(|| previous.last_name().map(str::to_string)),
            );
        }

        if request.picture.is_some() {
            user.set_picture(request.picture);
        }

        if let Some(status) = request.status {
            user.set_status(status);
        }

        let user = self.repository.update(user).await?;

        self.audit
            .create_organization_audit_log(
                by,
                AuditEvent::UserUpdated,
                BTreeMap::from([(AuditProperty::User, user.id().to_string())]),
                changes(Some(&previous), Some(&user)),
            )
            .await;

        Ok(user)
    }

    /// Archive a user that no longer owns any API or application
    pub async fn delete(&self, id: &str, by: &str) -> Result<(), DomainError> {
        let previous = self.find_by_id(id).await?;

        let owned: Vec<String> = self
            .memberships
            .get_memberships_by_member(id, None)
            .await?
            .into_iter()
            .filter(|m| {
                m.is_primary_owner()
                    && matches!(
                        m.reference_type(),
                        MembershipReferenceType::Api | MembershipReferenceType::Application
                    )
            })
            .map(|m| format!("{} {}", m.reference_type(), m.reference_id()))
            .collect();

        if !owned.is_empty() {
            return Err(DomainError::validation(format!(
                "User [{}] is still primary owner of [{}]",
                id,
                owned.join(", ")
            )));
        }

        let mut user = previous.clone();
        user.archive();
        self.repository.update(user).await?;
        self.memberships.delete_member_memberships(id).await?;

        info!(user_id = id, "User archived");

        self.audit
            .create_organization_audit_log(
                by,
                AuditEvent::UserDeleted,
                BTreeMap::from([(AuditProperty::User, id.to_string())]),
                changes(Some(&previous), None),
            )
            .await;

        Ok(())
    }

    /// Check credentials and record the connection
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, DomainError> {
        let invalid = || DomainError::credential("Invalid username or password");

        let mut user = self
            .repository
            .get_by_username(username)
            .await?
            .ok_or_else(invalid)?;

        if !user.status().can_login() {
            return Err(invalid());
        }

        let hash = user.password_hash().ok_or_else(invalid)?;
        if !self.hasher.verify(password, hash) {
            return Err(invalid());
        }

        user.record_connection();
        let user = self.repository.update(user).await?;

        self.audit
            .create_organization_audit_log(
                user.id().as_str(),
                AuditEvent::UserConnected,
                BTreeMap::from([(AuditProperty::User, user.id().to_string())]),
                vec![],
            )
            .await;

        Ok(user)
    }

    pub async fn change_password(
        &self,
        id: &str,
        request: UpdatePasswordRequest,
    ) -> Result<User, DomainError> {
        let mut user = self.find_by_id(id).await?;

        let current_matches = user
            .password_hash()
            .is_some_and(|hash| self.hasher.verify(&request.current_password, hash));
        if !current_matches {
            return Err(DomainError::validation("Current password is incorrect"));
        }

        validate_password(&request.new_password)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        user.set_password_hash(self.hasher.hash(&request.new_password)?);
        let user = self.repository.update(user).await?;

        self.audit
            .create_organization_audit_log(
                id,
                AuditEvent::PasswordChanged,
                BTreeMap::from([(AuditProperty::User, id.to_string())]),
                vec![],
            )
            .await;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::role::Role;
    use crate::infrastructure::audit::StorageAuditRepository;
    use crate::infrastructure::membership::StorageMembershipRepository;
    use crate::infrastructure::role::StorageRoleRepository;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::user::{Argon2Hasher, StorageUserRepository};

    async fn create_service() -> (UserService, Arc<MembershipService>) {
        let roles = Arc::new(StorageRoleRepository::new(Arc::new(InMemoryStorage::new())));
        for role in Role::system_roles() {
            roles.create(role).await.unwrap();
        }
        let users = Arc::new(StorageUserRepository::new(Arc::new(InMemoryStorage::new())));
        let audit = Arc::new(AuditService::new(
            Arc::new(StorageAuditRepository::new(Arc::new(InMemoryStorage::new()))),
            "DEFAULT",
            "DEFAULT",
        ));
        let memberships = Arc::new(MembershipService::new(
            Arc::new(StorageMembershipRepository::new(Arc::new(InMemoryStorage::new()))),
            roles.clone(),
            users.clone(),
            audit.clone(),
        ));

        let service = UserService::new(
            users,
            roles,
            memberships.clone(),
            Arc::new(Argon2Hasher::new()),
            audit,
            "DEFAULT",
            "DEFAULT",
        );
        (service, memberships)
    }

    fn make_request(username: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: Some(format!("{}@example.com", username)),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_user_assigns_default_roles() {
        let (service, memberships) = create_service().await;

        let user = service
            .create(make_request("testuser", "secure_password123"), "admin")
            .await
            .unwrap();
        assert_eq!(user.username(), "testuser");
        assert!(user.is_active());

        let held = memberships
            .get_memberships_by_member(user.id().as_str(), None)
            .await
            .unwrap();
        let mut roles: Vec<_> = held.iter().map(|m| m.role().to_string()).collect();
        roles.sort();
        assert_eq!(roles, vec!["ENVIRONMENT:USER", "ORGANIZATION:USER"]);
    }

    #[tokio::test]
    async fn test_create_user_invalid_input() {
        let (service, _) = create_service().await;

        let result = service.create(make_request("ab", "secure_password123"), "admin").await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));

        let result = service.create(make_request("testuser", "short"), "admin").await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_duplicate_username_or_email() {
        let (service, _) = create_service().await;

        service
            .create(make_request("testuser", "secure_password123"), "admin")
            .await
            .unwrap();

        let result = service
            .create(make_request("TestUser", "secure_password456"), "admin")
            .await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));

        let mut request = make_request("other", "secure_password456");
        request.email = Some("testuser@example.com".to_string());
        let result = service.create(request, "admin").await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (service, _) = create_service().await;
        service
            .create(make_request("testuser", "secure_password123"), "admin")
            .await
            .unwrap();

        let user = service
            .authenticate("testuser", "secure_password123")
            .await
            .unwrap();
        assert!(user.last_connection_at().is_some());

        let result = service.authenticate("testuser", "wrong_password").await;
        assert!(matches!(result, Err(DomainError::Credential { .. })));

        let result = service.authenticate("nobody", "secure_password123").await;
        assert!(matches!(result, Err(DomainError::Credential { .. })));
    }

    #[tokio::test]
    async fn test_archived_user_cannot_login() {
        let (service, _) = create_service().await;
        let user = service
            .create(make_request("testuser", "secure_password123"), "admin")
            .await
            .unwrap();

        service.delete(user.id().as_str(), "admin").await.unwrap();

        let archived = service.find_by_id(user.id().as_str()).await.unwrap();
        assert_eq!(archived.status(), UserStatus::Archived);
        assert!(service
            .authenticate("testuser", "secure_password123")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_refused_for_primary_owner() {
        let (service, memberships) = create_service().await;
        let user = service
            .create(make_request("owner", "secure_password123"), "admin")
            .await
            .unwrap();
        memberships
            .set_primary_owner(MembershipReferenceType::Api, "api-1", user.id().as_str())
            .await
            .unwrap();

        let result = service.delete(user.id().as_str(), "admin").await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (service, _) = create_service().await;
        let user = service
            .create(make_request("testuser", "old_password123"), "admin")
            .await
            .unwrap();

        let result = service
            .change_password(
                user.id().as_str(),
                UpdatePasswordRequest {
                    current_password: "wrong_current".to_string(),
                    new_password: "new_password456".to_string(),
                },
            )
            .await;
        assert!(result.is_err());

        service
            .change_password(
                user.id().as_str(),
                UpdatePasswordRequest {
                    current_password: "old_password123".to_string(),
                    new_password: "new_password456".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(service.authenticate("testuser", "old_password123").await.is_err());
        assert!(service.authenticate("testuser", "new_password456").await.is_ok());
    }

    #[tokio::test]
    async fn test_initialize_admin_once() {
        let (service, memberships) = create_service().await;

        let admin = service
            .initialize_admin("admin", "admin-password", None)
            .await
            .unwrap()
            .unwrap();
        assert!(service
            .initialize_admin("admin2", "admin-password", None)
            .await
            .unwrap()
            .is_none());

        let held = memberships
            .get_memberships_by_member(admin.id().as_str(), None)
            .await
            .unwrap();
        assert!(held.iter().any(|m| m.role().as_str() == "ORGANIZATION:ADMIN"));
        assert!(held.iter().any(|m| m.role().as_str() == "ENVIRONMENT:ADMIN"));
    }

    #[tokio::test]
    async fn test_search_and_update() {
        let (service, _) = create_service().await;
        for name in ["alice", "bob", "alfred"] {
            service
                .create(make_request(name, "secure_password123"), "admin")
                .await
                .unwrap();
        }

        let page = service.search(Some("al"), Pageable::default()).await.unwrap();
        assert_eq!(page.total_elements, 2);

        let bob = service.find_by_username("bob").await.unwrap();
        let updated = service
            .update(
                bob.id().as_str(),
                UpdateUserRequest {
                    first_name: Some("Bob".to_string()),
                    last_name: Some("Builder".to_string()),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name(), "Bob Builder");
    }
}
