//! Members of APIs and applications

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::membership::MembershipReferenceType;
use crate::domain::role::{Actions, RoleKey, RolePermission};
use crate::domain::user::User;
use crate::infrastructure::membership::Member;

#[derive(Debug, Deserialize)]
pub struct AddMemberBody {
    /// Id of the user to add
    pub id: String,
    /// Role name in the reference's scope, e.g. `USER` or `OWNER`
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct MemberQuery {
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferOwnershipBody {
    /// Id of the future primary owner
    pub id: String,
    /// Role the former primary owner keeps; defaults to `OWNER`
    pub po_role: Option<String>,
}

fn member_permission(reference_type: MembershipReferenceType) -> RolePermission {
    match reference_type {
        MembershipReferenceType::Application => RolePermission::ApplicationMember,
        _ => RolePermission::ApiMember,
    }
}

async fn list(
    state: &AppState,
    user: &User,
    reference_type: MembershipReferenceType,
    reference_id: &str,
) -> Result<Vec<Member>, ApiError> {
    state
        .require(user, member_permission(reference_type), reference_id, Actions::READ)
        .await?;
    ensure_reference(state, reference_type, reference_id).await?;

    Ok(state
        .services
        .memberships
        .get_members_by_reference(reference_type, reference_id)
        .await?)
}

async fn add(
    state: &AppState,
    user: &User,
    reference_type: MembershipReferenceType,
    reference_id: &str,
    body: AddMemberBody,
) -> Result<Member, ApiError> {
    state
        .require(user, member_permission(reference_type), reference_id, Actions::CREATE)
        .await?;
    ensure_reference(state, reference_type, reference_id).await?;

    let role = RoleKey::of(reference_type.default_scope(), &body.role);
    let memberships = &state.services.memberships;
    memberships
        .add_role_to_member_on_reference(
            reference_type,
            reference_id,
            &body.id,
            role,
            user.id().as_str(),
        )
        .await?;

    Ok(memberships
        .get_member(reference_type, reference_id, &body.id)
        .await?)
}

async fn remove(
    state: &AppState,
    user: &User,
    reference_type: MembershipReferenceType,
    reference_id: &str,
    member: &str,
) -> Result<StatusCode, ApiError> {
    state
        .require(user, member_permission(reference_type), reference_id, Actions::DELETE)
        .await?;
    ensure_reference(state, reference_type, reference_id).await?;

    state
        .services
        .memberships
        .delete_member(reference_type, reference_id, member, user.id().as_str())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transfer(
    state: &AppState,
    user: &User,
    reference_type: MembershipReferenceType,
    reference_id: &str,
    body: TransferOwnershipBody,
) -> Result<StatusCode, ApiError> {
    state
        .require(user, member_permission(reference_type), reference_id, Actions::UPDATE)
        .await?;
    ensure_reference(state, reference_type, reference_id).await?;

    state
        .services
        .memberships
        .transfer_ownership(
            reference_type,
            reference_id,
            &body.id,
            body.po_role.as_deref(),
            user.id().as_str(),
        )
        .await?;
    Ok(StatusCode::OK)
}

/// 404 for members of an API or application that does not exist
async fn ensure_reference(
    state: &AppState,
    reference_type: MembershipReferenceType,
    reference_id: &str,
) -> Result<(), ApiError> {
    match reference_type {
        MembershipReferenceType::Api => {
            state.services.apis.find_by_id(reference_id).await?;
        }
        MembershipReferenceType::Application => {
            state.services.applications.find_by_id(reference_id).await?;
        }
        _ => {}
    }
    Ok(())
}

/// GET /management/apis/{api}/members
pub async fn list_api_members(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
) -> Result<Json<Vec<Member>>, ApiError> {
    list(&state, &user, MembershipReferenceType::Api, &api)
        .await
        .map(Json)
}

/// POST /management/apis/{api}/members
pub async fn add_api_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<Member>, ApiError> {
    add(&state, &user, MembershipReferenceType::Api, &api, body)
        .await
        .map(Json)
}

/// DELETE /management/apis/{api}/members?user=
pub async fn delete_api_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Query(query): Query<MemberQuery>,
) -> Result<StatusCode, ApiError> {
    remove(&state, &user, MembershipReferenceType::Api, &api, &query.user).await
}

/// POST /management/apis/{api}/members/transfer_ownership
pub async fn transfer_api_ownership(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Json(body): Json<TransferOwnershipBody>,
) -> Result<StatusCode, ApiError> {
    transfer(&state, &user, MembershipReferenceType::Api, &api, body).await
}

/// GET /management/applications/{application}/members
pub async fn list_application_members(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
) -> Result<Json<Vec<Member>>, ApiError> {
    list(&state, &user, MembershipReferenceType::Application, &application)
        .await
        .map(Json)
}

/// POST /management/applications/{application}/members
pub async fn add_application_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<Member>, ApiError> {
    add(&state, &user, MembershipReferenceType::Application, &application, body)
        .await
        .map(Json)
}

/// DELETE /management/applications/{application}/members?user=
pub async fn delete_application_member(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
    Query(query): Query<MemberQuery>,
) -> Result<StatusCode, ApiError> {
    remove(
        &state,
        &user,
        MembershipReferenceType::Application,
        &application,
        &query.user,
    )
    .await
}

/// POST /management/applications/{application}/members/transfer_ownership
pub async fn transfer_application_ownership(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
    Json(body): Json<TransferOwnershipBody>,
) -> Result<StatusCode, ApiError> {
    transfer(&state, &user, MembershipReferenceType::Application, &application, body).await
}
