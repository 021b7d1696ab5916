//! Plans of an API

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::parse_list;
use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json};
use crate::domain::plan::{Plan, PlanSecurity, PlanStatus, PlanValidation};
use crate::domain::role::{Actions, RolePermission};
use crate::infrastructure::plan::{CreatePlanRequest, UpdatePlanRequest};

#[derive(Debug, Deserialize)]
pub struct PlanListQuery {
    /// Comma separated statuses; all plans when absent
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub security: PlanSecurity,
    #[serde(default)]
    pub validation: PlanValidation,
    #[serde(default)]
    pub characteristics: Vec<String>,
    #[serde(default)]
    pub excluded_groups: BTreeSet<String>,
    #[serde(default)]
    pub comment_required: bool,
    pub comment_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub validation: Option<PlanValidation>,
    pub characteristics: Option<Vec<String>>,
    pub excluded_groups: Option<BTreeSet<String>>,
    pub comment_required: Option<bool>,
    pub comment_message: Option<String>,
    pub order: Option<u32>,
}

/// GET /management/apis/{api}/plans
pub async fn list_plans(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Query(query): Query<PlanListQuery>,
) -> Result<Json<Vec<Plan>>, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::READ)
        .await?;
    state.services.apis.find_by_id(&api).await?;

    let statuses = parse_list(query.status.as_deref(), "status", PlanStatus::parse)?;
    let mut plans = state.services.plans.find_by_api(&api, &statuses).await?;
    plans.sort_by_key(|plan| plan.order());

    Ok(Json(plans))
}

/// POST /management/apis/{api}/plans
pub async fn create_plan(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Json(body): Json<CreatePlanBody>,
) -> Result<Created<Plan>, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::CREATE)
        .await?;
    state.services.apis.find_by_id(&api).await?;

    let plan = state
        .services
        .plans
        .create(
            &api,
            CreatePlanRequest {
                name: body.name,
                description: body.description,
                security: body.security,
                validation: body.validation,
                characteristics: body.characteristics,
                excluded_groups: body.excluded_groups,
                comment_required: body.comment_required,
                comment_message: body.comment_message,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Created::new(
        format!("/management/apis/{}/plans/{}", api, plan.id()),
        plan,
    ))
}

/// GET /management/apis/{api}/plans/{plan}
pub async fn get_plan(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<Json<Plan>, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::READ)
        .await?;

    Ok(Json(state.services.plans.find_by_id(&api, &id).await?))
}

/// PUT /management/apis/{api}/plans/{plan}
pub async fn update_plan(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
    Json(body): Json<UpdatePlanBody>,
) -> Result<Json<Plan>, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::UPDATE)
        .await?;

    let plan = state
        .services
        .plans
        .update(
            &api,
            &id,
            UpdatePlanRequest {
                name: body.name,
                description: body.description,
                validation: body.validation,
                characteristics: body.characteristics,
                excluded_groups: body.excluded_groups,
                comment_required: body.comment_required,
                comment_message: body.comment_message,
                order: body.order,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Json(plan))
}

/// DELETE /management/apis/{api}/plans/{plan}
pub async fn delete_plan(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::DELETE)
        .await?;

    state
        .services
        .plans
        .delete(&api, &id, user.id().as_str())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /management/apis/{api}/plans/{plan}/_publish
pub async fn publish_plan(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<Json<Plan>, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::UPDATE)
        .await?;

    let plan = state
        .services
        .plans
        .publish(&api, &id, user.id().as_str())
        .await?;
    Ok(Json(plan))
}

/// POST /management/apis/{api}/plans/{plan}/_deprecate
pub async fn deprecate_plan(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<Json<Plan>, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::UPDATE)
        .await?;

    let plan = state
        .services
        .plans
        .deprecate(&api, &id, user.id().as_str())
        .await?;
    Ok(Json(plan))
}

/// POST /management/apis/{api}/plans/{plan}/_close
pub async fn close_plan(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<Json<Plan>, ApiError> {
    state
        .require(&user, RolePermission::ApiPlan, &api, Actions::DELETE)
        .await?;

    let plan = state
        .services
        .plans
        .close(&api, &id, user.id().as_str())
        .await?;
    Ok(Json(plan))
}
