//! Groups, their members and their association with APIs and applications

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::jobs::AsyncJobResponse;
use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json};
use crate::domain::api::Api;
use crate::domain::application::Application;
use crate::domain::group::{Group, GroupEventRule};
use crate::domain::role::{Actions, RolePermission, RoleScope};
use crate::domain::user::User;
use crate::infrastructure::group::{GroupAssociation, GroupRequest};
use crate::infrastructure::membership::Member;

#[derive(Debug, Deserialize)]
pub struct GroupBody {
    pub name: String,
    #[serde(default)]
    pub event_rules: BTreeSet<GroupEventRule>,
    pub max_invitation: Option<u32>,
    #[serde(default)]
    pub lock_api_role: bool,
    #[serde(default)]
    pub lock_application_role: bool,
    #[serde(default)]
    pub system_invitation: bool,
    #[serde(default)]
    pub email_invitation: bool,
    #[serde(default)]
    pub disable_membership_notifications: bool,
}

impl From<GroupBody> for GroupRequest {
    fn from(body: GroupBody) -> Self {
        Self {
            name: body.name,
            event_rules: body.event_rules,
            max_invitation: body.max_invitation,
            lock_api_role: body.lock_api_role,
            lock_application_role: body.lock_application_role,
            system_invitation: body.system_invitation,
            email_invitation: body.email_invitation,
            disable_membership_notifications: body.disable_membership_notifications,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupMemberBody {
    /// Id of the user
    pub id: String,
    /// Role name per scope, e.g. `{"API": "USER", "GROUP": "ADMIN"}`
    pub roles: BTreeMap<RoleScope, String>,
}

#[derive(Debug, Deserialize)]
pub struct AssociationQuery {
    #[serde(rename = "type")]
    pub association: String,
}

/// APIs or applications listing a group
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GroupReferences {
    Apis(Vec<Api>),
    Applications(Vec<Application>),
}

fn association(query: &AssociationQuery) -> Result<GroupAssociation, ApiError> {
    GroupAssociation::parse(&query.association).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Unknown association type '{}', expected 'api' or 'application'",
            query.association
        ))
        .with_param("type")
    })
}

/// Group member permission on the group, or environment admin
async fn require_member_access(
    state: &AppState,
    user: &User,
    group: &str,
    actions: Actions,
) -> Result<(), ApiError> {
    if state
        .has(user, RolePermission::GroupMember, group, actions)
        .await?
        || state
            .services
            .permissions
            .is_environment_admin(user.id().as_str())
            .await?
    {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not have sufficient rights to access this resource"))
    }
}

/// GET /management/configuration/groups
pub async fn list_groups(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Group>>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentGroup, "", Actions::READ)
        .await?;

    let mut groups = state.services.groups.find_all().await?;
    groups.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
    Ok(Json(groups))
}

/// POST /management/configuration/groups
pub async fn create_group(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<GroupBody>,
) -> Result<Created<Group>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentGroup, "", Actions::CREATE)
        .await?;

    let group = state
        .services
        .groups
        .create(body.into(), user.id().as_str())
        .await?;

    Ok(Created::new(
        format!("/management/configuration/groups/{}", group.id()),
        group,
    ))
}

/// GET /management/configuration/groups/{group}
pub async fn get_group(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentGroup, "", Actions::READ)
        .await?;

    Ok(Json(state.services.groups.find_by_id(&id).await?))
}

/// PUT /management/configuration/groups/{group}
pub async fn update_group(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Json(body): Json<GroupBody>,
) -> Result<Json<Group>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentGroup, "", Actions::UPDATE)
        .await?;

    let group = state
        .services
        .groups
        .update(&id, body.into(), user.id().as_str())
        .await?;
    Ok(Json(group))
}

/// DELETE /management/configuration/groups/{group}
pub async fn delete_group(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentGroup, "", Actions::DELETE)
        .await?;

    state.services.groups.delete(&id, user.id().as_str()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /management/configuration/groups/{group}/members
pub async fn list_group_members(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Member>>, ApiError> {
    require_member_access(&state, &user, &id, Actions::READ).await?;

    Ok(Json(state.services.groups.members(&id).await?))
}

/// POST /management/configuration/groups/{group}/members
pub async fn add_group_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Json(body): Json<GroupMemberBody>,
) -> Result<Json<Member>, ApiError> {
    require_member_access(&state, &user, &id, Actions::CREATE).await?;

    let member = state
        .services
        .groups
        .add_member(&id, &body.id, body.roles, user.id().as_str())
        .await?;
    Ok(Json(member))
}

/// DELETE /management/configuration/groups/{group}/members/{member}
pub async fn delete_group_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((id, member)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_member_access(&state, &user, &id, Actions::DELETE).await?;

    state
        .services
        .groups
        .delete_member(&id, &member, user.id().as_str())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /management/configuration/groups/{group}/memberships?type=api|application
pub async fn group_references(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Query(query): Query<AssociationQuery>,
) -> Result<Json<GroupReferences>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentGroup, "", Actions::READ)
        .await?;
    let groups = &state.services.groups;
    groups.find_by_id(&id).await?;

    let references = match association(&query)? {
        GroupAssociation::Api => GroupReferences::Apis(groups.find_apis(&id).await?),
        GroupAssociation::Application => {
            GroupReferences::Applications(groups.find_applications(&id).await?)
        }
    };
    Ok(Json(references))
}

/// POST /management/configuration/groups/{group}/memberships?type=api|application
///
/// Answers 202 with the job; the association runs in the background.
pub async fn associate_group(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Query(query): Query<AssociationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentGroup, "", Actions::UPDATE)
        .await?;

    let job = state
        .services
        .groups
        .associate(&id, association(&query)?, user.id().as_str())
        .await?;

    Ok((StatusCode::ACCEPTED, Json(AsyncJobResponse::from(&job))))
}
