//! API definitions and their gateway lifecycle

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::debug;

use crate::api::middleware::{MaybeUser, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json, PageQuery, PagedResult};
use crate::domain::api::{Api, ApiLifecycleState, LifecycleState, Visibility};
use crate::domain::role::{Actions, RolePermission};
use crate::infrastructure::api::{ApiQuery, ApiState, NewApi, UpdateApi};

#[derive(Debug, Deserialize)]
pub struct ApiSearchQuery {
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    pub lifecycle_state: Option<LifecycleState>,
    pub tag: Option<String>,
    pub label: Option<String>,
    pub group: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiBody {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub context_path: String,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApiBody {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub context_path: Option<String>,
    pub endpoint: Option<String>,
    pub visibility: Option<Visibility>,
    pub lifecycle_state: Option<ApiLifecycleState>,
    pub tags: Option<BTreeSet<String>>,
    pub labels: Option<Vec<String>>,
    pub categories: Option<BTreeSet<String>>,
    pub groups: Option<BTreeSet<String>>,
    pub picture: Option<String>,
    pub disable_membership_notifications: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleActionQuery {
    pub action: String,
}

/// GET /management/apis
///
/// Anonymous callers only see public APIs.
pub async fn list_apis(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<ApiSearchQuery>,
) -> Result<Json<PagedResult<Api>>, ApiError> {
    let pageable = PageQuery {
        page: query.page,
        size: query.size,
    }
    .pageable();
    let search = ApiQuery {
        name: query.name,
        visibility: query.visibility,
        lifecycle_state: query.lifecycle_state,
        tag: query.tag,
        label: query.label,
        group: query.group,
    };

    let page = state.services.apis.search(search, user.id(), pageable).await?;
    Ok(Json(PagedResult::from_page(page, |api| api)))
}

/// POST /management/apis
pub async fn create_api(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreateApiBody>,
) -> Result<Created<Api>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentApi, "", Actions::CREATE)
        .await?;
    debug!(name = %body.name, context_path = %body.context_path, "Creating API");

    let api = state
        .services
        .apis
        .create(
            NewApi {
                name: body.name,
                version: body.version,
                description: body.description,
                context_path: body.context_path,
                endpoint: body.endpoint,
                groups: body.groups,
                tags: body.tags,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Created::new(format!("/management/apis/{}", api.id()), api))
}

/// GET /management/apis/{api}
///
/// Public APIs are readable by anyone; private ones need the definition permission.
pub async fn get_api(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<Api>, ApiError> {
    let api = state.services.apis.find_by_id(&id).await?;

    if api.visibility() != Visibility::Public {
        match &user.0 {
            Some(user) => {
                state
                    .require(user, RolePermission::ApiDefinition, &id, Actions::READ)
                    .await?
            }
            None => return Err(ApiError::unauthorized("You must be authenticated")),
        }
    }

    Ok(Json(api))
}

/// PUT /management/apis/{api}
pub async fn update_api(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateApiBody>,
) -> Result<Json<Api>, ApiError> {
    state
        .require(&user, RolePermission::ApiDefinition, &id, Actions::UPDATE)
        .await?;

    let api = state
        .services
        .apis
        .update(
            &id,
            UpdateApi {
                name: body.name,
                version: body.version,
                description: body.description,
                context_path: body.context_path,
                endpoint: body.endpoint,
                visibility: body.visibility,
                api_lifecycle_state: body.lifecycle_state,
                tags: body.tags,
                labels: body.labels,
                categories: body.categories,
                groups: body.groups,
                picture: body.picture,
                disable_membership_notifications: body.disable_membership_notifications,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Json(api))
}

/// DELETE /management/apis/{api}
pub async fn delete_api(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::ApiDefinition, &id, Actions::DELETE)
        .await?;

    state.services.apis.delete(&id, user.id().as_str()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /management/apis/{api}?action=START|STOP
pub async fn change_lifecycle(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Query(query): Query<LifecycleActionQuery>,
) -> Result<Json<Api>, ApiError> {
    state
        .require(&user, RolePermission::ApiDefinition, &id, Actions::UPDATE)
        .await?;

    let apis = &state.services.apis;
    let api = match query.action.to_ascii_uppercase().as_str() {
        "START" => apis.start(&id, user.id().as_str()).await?,
        "STOP" => apis.stop(&id, user.id().as_str()).await?,
        other => {
            return Err(
                ApiError::bad_request(format!("Unknown lifecycle action '{}'", other))
                    .with_param("action"),
            )
        }
    };

    Ok(Json(api))
}

/// POST /management/apis/{api}/deploy
pub async fn deploy_api(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<Api>, ApiError> {
    state
        .require(&user, RolePermission::ApiDefinition, &id, Actions::UPDATE)
        .await?;

    let api = state.services.apis.deploy(&id, user.id().as_str()).await?;
    Ok(Json(api))
}

/// GET /management/apis/{api}/state
pub async fn api_state(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<ApiState>, ApiError> {
    state
        .require(&user, RolePermission::ApiDefinition, &id, Actions::READ)
        .await?;

    Ok(Json(state.services.apis.state(&id).await?))
}
