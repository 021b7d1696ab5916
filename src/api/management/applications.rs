//! Applications consuming APIs

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json};
use crate::domain::application::{
    ApiKeyMode, AppSettings, Application, ApplicationStatus, ApplicationType,
};
use crate::domain::role::{Actions, RolePermission};
use crate::infrastructure::application::{
    ApplicationQuery, NewApplication, OAuthClientRequest, UpdateApplication,
};

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub name: Option<String>,
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthClientBody {
    #[serde(default)]
    pub application_type: ApplicationType,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl From<OAuthClientBody> for OAuthClientRequest {
    fn from(body: OAuthClientBody) -> Self {
        Self {
            application_type: body.application_type,
            grant_types: body.grant_types,
            redirect_uris: body.redirect_uris,
        }
    }
}

/// Exactly one of `app` and `oauth` is expected
#[derive(Debug, Default, Deserialize)]
pub struct SettingsBody {
    pub app: Option<AppSettings>,
    pub oauth: Option<OAuthClientBody>,
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub domain: Option<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    pub picture: Option<String>,
    #[serde(default)]
    pub settings: SettingsBody,
    pub api_key_mode: Option<ApiKeyMode>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub domain: Option<String>,
    pub groups: Option<BTreeSet<String>>,
    pub picture: Option<String>,
    #[serde(default)]
    pub settings: SettingsBody,
    pub api_key_mode: Option<ApiKeyMode>,
    pub disable_membership_notifications: Option<bool>,
}

/// GET /management/applications
pub async fn list_applications(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let applications = state
        .services
        .applications
        .find_by_user(
            user.id().as_str(),
            ApplicationQuery {
                name: query.name,
                status: query.status,
            },
        )
        .await?;

    Ok(Json(applications))
}

/// POST /management/applications
pub async fn create_application(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreateApplicationBody>,
) -> Result<Created<Application>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentApplication, "", Actions::CREATE)
        .await?;

    let application = state
        .services
        .applications
        .create(
            NewApplication {
                name: body.name,
                description: body.description,
                domain: body.domain,
                groups: body.groups,
                picture: body.picture,
                app: body.settings.app,
                oauth: body.settings.oauth.map(OAuthClientRequest::from),
                api_key_mode: body.api_key_mode,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Created::new(
        format!("/management/applications/{}", application.id()),
        application,
    ))
}

/// GET /management/applications/{application}
pub async fn get_application(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    state
        .require(&user, RolePermission::ApplicationDefinition, &id, Actions::READ)
        .await?;

    Ok(Json(state.services.applications.find_by_id(&id).await?))
}

/// PUT /management/applications/{application}
pub async fn update_application(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateApplicationBody>,
) -> Result<Json<Application>, ApiError> {
    state
        .require(&user, RolePermission::ApplicationDefinition, &id, Actions::UPDATE)
        .await?;

    let application = state
        .services
        .applications
        .update(
            &id,
            UpdateApplication {
                name: body.name,
                description: body.description,
                domain: body.domain,
                groups: body.groups,
                picture: body.picture,
                app: body.settings.app,
                oauth: body.settings.oauth.map(OAuthClientRequest::from),
                api_key_mode: body.api_key_mode,
                disable_membership_notifications: body.disable_membership_notifications,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Json(application))
}

/// DELETE /management/applications/{application}
///
/// Applications are archived, never removed.
pub async fn archive_application(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::ApplicationDefinition, &id, Actions::DELETE)
        .await?;

    state
        .services
        .applications
        .archive(&id, user.id().as_str())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /management/applications/{application}/renew_secret
pub async fn renew_client_secret(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    state
        .require(&user, RolePermission::ApplicationDefinition, &id, Actions::UPDATE)
        .await?;

    let application = state
        .services
        .applications
        .renew_client_secret(&id, user.id().as_str())
        .await?;
    Ok(Json(application))
}
