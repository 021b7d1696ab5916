//! Alert triggers on APIs, applications and the platform

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json};
use crate::domain::alert::{AlertReferenceType, AlertSeverity, AlertTrigger};
use crate::domain::role::{Actions, RolePermission};
use crate::domain::user::User;
use crate::infrastructure::alert::{AlertStatus, CreateAlertRequest, UpdateAlertRequest};

#[derive(Debug, Deserialize)]
pub struct CreateAlertBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: String,
    #[serde(default)]
    pub severity: AlertSeverity,
    pub source: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: serde_json::Value,
    #[serde(default)]
    pub filters: serde_json::Value,
    pub template: Option<bool>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub severity: Option<AlertSeverity>,
    pub enabled: Option<bool>,
    pub conditions: Option<serde_json::Value>,
    pub filters: Option<serde_json::Value>,
}

/// Where an alert route points
struct Target {
    reference_type: AlertReferenceType,
    reference_id: String,
    permission: RolePermission,
    location: String,
}

impl Target {
    fn api(api: String) -> Self {
        Self {
            location: format!("/management/apis/{}/alerts", api),
            reference_type: AlertReferenceType::Api,
            reference_id: api,
            permission: RolePermission::ApiAlert,
        }
    }

    fn application(application: String) -> Self {
        Self {
            location: format!("/management/applications/{}/alerts", application),
            reference_type: AlertReferenceType::Application,
            reference_id: application,
            permission: RolePermission::ApplicationAlert,
        }
    }

    fn platform(state: &AppState) -> Self {
        Self {
            location: "/management/platform/alerts".to_string(),
            reference_type: AlertReferenceType::Environment,
            reference_id: state.services.permissions.environment_id().to_string(),
            permission: RolePermission::EnvironmentAlert,
        }
    }

    async fn require(&self, state: &AppState, user: &User, actions: Actions) -> Result<(), ApiError> {
        state
            .require(user, self.permission, &self.reference_id, actions)
            .await?;
        match self.reference_type {
            AlertReferenceType::Api => {
                state.services.apis.find_by_id(&self.reference_id).await?;
            }
            AlertReferenceType::Application => {
                state
                    .services
                    .applications
                    .find_by_id(&self.reference_id)
                    .await?;
            }
            AlertReferenceType::Environment => {}
        }
        Ok(())
    }
}

async fn list(state: AppState, user: User, target: Target) -> Result<Json<Vec<AlertTrigger>>, ApiError> {
    target.require(&state, &user, Actions::READ).await?;

    let triggers = state
        .services
        .alerts
        .find_by_reference(target.reference_type, &target.reference_id)
        .await?;
    Ok(Json(triggers))
}

async fn create(
    state: AppState,
    user: User,
    target: Target,
    body: CreateAlertBody,
) -> Result<Created<AlertTrigger>, ApiError> {
    target.require(&state, &user, Actions::CREATE).await?;

    let trigger = state
        .services
        .alerts
        .create(
            target.reference_type,
            &target.reference_id,
            CreateAlertRequest {
                name: body.name,
                description: body.description,
                alert_type: body.alert_type,
                severity: body.severity,
                source: body.source,
                enabled: body.enabled,
                conditions: body.conditions,
                filters: body.filters,
                template: body.template,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Created::new(
        format!("{}/{}", target.location, trigger.id()),
        trigger,
    ))
}

async fn update(
    state: AppState,
    user: User,
    target: Target,
    id: String,
    body: UpdateAlertBody,
) -> Result<Json<AlertTrigger>, ApiError> {
    target.require(&state, &user, Actions::UPDATE).await?;

    let trigger = state
        .services
        .alerts
        .update(
            target.reference_type,
            &target.reference_id,
            &id,
            UpdateAlertRequest {
                name: body.name,
                description: body.description,
                severity: body.severity,
                enabled: body.enabled,
                conditions: body.conditions,
                filters: body.filters,
            },
            user.id().as_str(),
        )
        .await?;
    Ok(Json(trigger))
}

async fn delete(state: AppState, user: User, target: Target, id: String) -> Result<StatusCode, ApiError> {
    target.require(&state, &user, Actions::DELETE).await?;

    state
        .services
        .alerts
        .delete(
            target.reference_type,
            &target.reference_id,
            &id,
            user.id().as_str(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /management/alerts/status
pub async fn alert_status(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
) -> Json<AlertStatus> {
    Json(state.services.alerts.status())
}

/// GET /management/apis/{api}/alerts
pub async fn list_api_alerts(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
) -> Result<Json<Vec<AlertTrigger>>, ApiError> {
    list(state, user, Target::api(api)).await
}

/// POST /management/apis/{api}/alerts
pub async fn create_api_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Json(body): Json<CreateAlertBody>,
) -> Result<Created<AlertTrigger>, ApiError> {
    create(state, user, Target::api(api), body).await
}

/// PUT /management/apis/{api}/alerts/{alert}
pub async fn update_api_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
    Json(body): Json<UpdateAlertBody>,
) -> Result<Json<AlertTrigger>, ApiError> {
    update(state, user, Target::api(api), id, body).await
}

/// DELETE /management/apis/{api}/alerts/{alert}
pub async fn delete_api_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    delete(state, user, Target::api(api), id).await
}

/// GET /management/applications/{application}/alerts
pub async fn list_application_alerts(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
) -> Result<Json<Vec<AlertTrigger>>, ApiError> {
    list(state, user, Target::application(application)).await
}

/// POST /management/applications/{application}/alerts
pub async fn create_application_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
    Json(body): Json<CreateAlertBody>,
) -> Result<Created<AlertTrigger>, ApiError> {
    create(state, user, Target::application(application), body).await
}

/// PUT /management/applications/{application}/alerts/{alert}
pub async fn update_application_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((application, id)): Path<(String, String)>,
    Json(body): Json<UpdateAlertBody>,
) -> Result<Json<AlertTrigger>, ApiError> {
    update(state, user, Target::application(application), id, body).await
}

/// DELETE /management/applications/{application}/alerts/{alert}
pub async fn delete_application_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((application, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    delete(state, user, Target::application(application), id).await
}

/// GET /management/platform/alerts
pub async fn list_platform_alerts(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<AlertTrigger>>, ApiError> {
    let target = Target::platform(&state);
    list(state, user, target).await
}

/// POST /management/platform/alerts
pub async fn create_platform_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreateAlertBody>,
) -> Result<Created<AlertTrigger>, ApiError> {
    let target = Target::platform(&state);
    create(state, user, target, body).await
}

/// PUT /management/platform/alerts/{alert}
pub async fn update_platform_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateAlertBody>,
) -> Result<Json<AlertTrigger>, ApiError> {
    let target = Target::platform(&state);
    update(state, user, target, id, body).await
}

/// DELETE /management/platform/alerts/{alert}
pub async fn delete_platform_alert(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let target = Target::platform(&state);
    delete(state, user, target, id).await
}
