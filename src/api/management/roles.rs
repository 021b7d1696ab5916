//! Roles per scope

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json};
use crate::domain::role::{Actions, Role, RolePermission, RoleScope};
use crate::infrastructure::role::{CreateRoleRequest, UpdateRoleRequest};

#[derive(Debug, Deserialize)]
pub struct CreateRoleBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub default_role: bool,
    #[serde(default)]
    pub permissions: BTreeMap<RolePermission, Actions>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleBody {
    pub description: Option<String>,
    #[serde(default)]
    pub default_role: bool,
    #[serde(default)]
    pub permissions: BTreeMap<RolePermission, Actions>,
}

fn scope(value: &str) -> Result<RoleScope, ApiError> {
    RoleScope::parse(value).ok_or_else(|| {
        ApiError::not_found(format!("Role scope [{}] can not be found.", value))
            .with_param("scope")
    })
}

/// GET /management/configuration/rolescopes/{scope}/roles
pub async fn list_roles(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(scope_name): Path<String>,
) -> Result<Json<Vec<Role>>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationRole, "", Actions::READ)
        .await?;

    let mut roles = state.services.roles.find_by_scope(scope(&scope_name)?).await?;
    roles.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(Json(roles))
}

/// POST /management/configuration/rolescopes/{scope}/roles
pub async fn create_role(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(scope_name): Path<String>,
    Json(body): Json<CreateRoleBody>,
) -> Result<Created<Role>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationRole, "", Actions::CREATE)
        .await?;
    let scope = scope(&scope_name)?;

    let role = state
        .services
        .roles
        .create(
            scope,
            CreateRoleRequest {
                name: body.name,
                description: body.description,
                default_role: body.default_role,
                permissions: body.permissions,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Created::new(
        format!(
            "/management/configuration/rolescopes/{}/roles/{}",
            scope,
            role.name()
        ),
        role,
    ))
}

/// GET /management/configuration/rolescopes/{scope}/roles/{role}
pub async fn get_role(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((scope_name, name)): Path<(String, String)>,
) -> Result<Json<Role>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationRole, "", Actions::READ)
        .await?;

    Ok(Json(
        state
            .services
            .roles
            .find_by_id(scope(&scope_name)?, &name)
            .await?,
    ))
}

/// PUT /management/configuration/rolescopes/{scope}/roles/{role}
pub async fn update_role(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((scope_name, name)): Path<(String, String)>,
    Json(body): Json<UpdateRoleBody>,
) -> Result<Json<Role>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationRole, "", Actions::UPDATE)
        .await?;

    let role = state
        .services
        .roles
        .update(
            scope(&scope_name)?,
            &name,
            UpdateRoleRequest {
                description: body.description,
                default_role: body.default_role,
                permissions: body.permissions,
            },
            user.id().as_str(),
        )
        .await?;
    Ok(Json(role))
}

/// DELETE /management/configuration/rolescopes/{scope}/roles/{role}
pub async fn delete_role(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((scope_name, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::OrganizationRole, "", Actions::DELETE)
        .await?;

    state
        .services
        .roles
        .delete(scope(&scope_name)?, &name, user.id().as_str())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
