//! Application state shared by every handler

use std::sync::Arc;

use crate::domain::role::{Actions, RolePermission};
use crate::domain::user::User;
use crate::domain::DomainError;
use crate::infrastructure::auth::JwtService;
use crate::infrastructure::services::Services;

#[derive(Debug, Clone)]
pub struct AppState {
    pub services: Services,
    pub jwt: Arc<JwtService>,
}

impl AppState {
    pub fn new(services: Services, jwt: JwtService) -> Self {
        Self {
            services,
            jwt: Arc::new(jwt),
        }
    }

    /// Fail with `Forbidden` unless `user` holds `permission` with `actions` on `reference_id`
    pub async fn require(
        &self,
        user: &User,
        permission: RolePermission,
        reference_id: &str,
        actions: Actions,
    ) -> Result<(), DomainError> {
        self.services
            .permissions
            .require_permission(user.id().as_str(), permission, reference_id, actions)
            .await
    }

    pub async fn has(
        &self,
        user: &User,
        permission: RolePermission,
        reference_id: &str,
        actions: Actions,
    ) -> Result<bool, DomainError> {
        self.services
            .permissions
            .has_permission(user.id().as_str(), permission, reference_id, actions)
            .await
    }
}
