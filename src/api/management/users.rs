//! Organization users and the current user's profile

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json, PageQuery, PagedResult};
use crate::domain::membership::{Membership, MembershipReferenceType};
use crate::domain::role::{Actions, RolePermission};
use crate::domain::user::{User, UserStatus};
use crate::infrastructure::user::{
    CreateUserRequest, UpdatePasswordRequest, UpdateUserRequest, UpdateUserRolesRequest,
};

/// A user as exposed over HTTP; the password hash never leaves the service
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub source: String,
    pub status: UserStatus,
    pub last_connection_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            username: user.username().to_string(),
            display_name: user.display_name(),
            email: user.email().map(String::from),
            first_name: user.first_name().map(String::from),
            last_name: user.last_name().map(String::from),
            picture: user.picture().map(String::from),
            source: user.source().to_string(),
            status: user.status(),
            last_connection_at: user.last_connection_at(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

/// The caller with the organization and environment permissions they hold
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub permissions: BTreeMap<RolePermission, Actions>,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub id: String,
    pub reference_type: MembershipReferenceType,
    pub reference_id: String,
    pub role: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Membership> for MembershipResponse {
    fn from(membership: &Membership) -> Self {
        Self {
            id: membership.id().to_string(),
            reference_type: membership.reference_type(),
            reference_id: membership.reference_id().to_string(),
            role: membership.role().to_string(),
            source: membership.source().to_string(),
            created_at: membership.created_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl UserSearchQuery {
    fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            size: self.size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserBody {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRolesBody {
    pub organization_role: Option<String>,
    pub environment_role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipTypeQuery {
    #[serde(rename = "type")]
    pub reference_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    pub current_password: String,
    pub new_password: String,
}

/// GET /management/organization/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<PagedResult<UserResponse>>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationUsers, "", Actions::READ)
        .await?;

    let page = state
        .services
        .users
        .search(query.q.as_deref(), query.page_query().pageable())
        .await?;

    Ok(Json(PagedResult::from_page(page, |u| UserResponse::from(&u))))
}

/// POST /management/organization/users
pub async fn create_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreateUserBody>,
) -> Result<Created<UserResponse>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationUsers, "", Actions::CREATE)
        .await?;
    debug!(username = %body.username, "Creating user");

    let created = state
        .services
        .users
        .create(
            CreateUserRequest {
                username: body.username,
                email: body.email,
                first_name: body.first_name,
                last_name: body.last_name,
                password: body.password,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Created::new(
        format!("/management/organization/users/{}", created.id()),
        UserResponse::from(&created),
    ))
}

/// GET /management/organization/users/{user}
pub async fn get_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationUsers, "", Actions::READ)
        .await?;

    let found = state.services.users.find_by_id(&id).await?;
    Ok(Json(UserResponse::from(&found)))
}

/// PUT /management/organization/users/{user}
pub async fn update_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<UserResponse>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationUsers, "", Actions::UPDATE)
        .await?;

    let updated = state
        .services
        .users
        .update(
            &id,
            UpdateUserRequest {
                first_name: body.first_name,
                last_name: body.last_name,
                email: body.email,
                picture: body.picture,
                status: body.status,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Json(UserResponse::from(&updated)))
}

/// DELETE /management/organization/users/{user}
pub async fn delete_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::OrganizationUsers, "", Actions::DELETE)
        .await?;

    state.services.users.delete(&id, user.id().as_str()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /management/organization/users/{user}/memberships?type=
pub async fn user_memberships(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Query(query): Query<MembershipTypeQuery>,
) -> Result<Json<Vec<MembershipResponse>>, ApiError> {
    state
        .require(&user, RolePermission::OrganizationUsers, "", Actions::READ)
        .await?;

    let reference_type = query
        .reference_type
        .as_deref()
        .map(|value| {
            MembershipReferenceType::parse(value).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown membership type '{}'", value))
                    .with_param("type")
            })
        })
        .transpose()?;

    let member = state.services.users.find_by_id(&id).await?;
    let memberships = state
        .services
        .memberships
        .get_memberships_by_member(member.id().as_str(), reference_type)
        .await?;

    Ok(Json(memberships.iter().map(MembershipResponse::from).collect()))
}

/// PUT /management/organization/users/{user}/roles
pub async fn update_user_roles(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRolesBody>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::OrganizationUsers, "", Actions::UPDATE)
        .await?;

    state
        .services
        .users
        .update_roles(
            &id,
            UpdateUserRolesRequest {
                organization_role: body.organization_role,
                environment_role: body.environment_role,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(StatusCode::OK)
}

/// GET /management/user
pub async fn current_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let permissions = state
        .services
        .permissions
        .environment_permissions(user.id().as_str())
        .await?;

    Ok(Json(CurrentUserResponse {
        user: UserResponse::from(&user),
        permissions,
    }))
}

/// POST /management/user/password
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .services
        .users
        .change_password(
            user.id().as_str(),
            UpdatePasswordRequest {
                current_password: body.current_password,
                new_password: body.new_password,
            },
        )
        .await?;

    Ok(Json(UserResponse::from(&updated)))
}
