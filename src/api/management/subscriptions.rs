//! Subscriptions and API keys, from the API side and the application side

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parse_list;
use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Created, Json};
use crate::domain::api_key::ApiKey;
use crate::domain::role::{Actions, RolePermission};
use crate::domain::subscription::{Subscription, SubscriptionCriteria, SubscriptionStatus};
use crate::infrastructure::subscription::{NewSubscription, ProcessSubscription};

/// An API key without its hash
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub key: String,
    pub application: String,
    pub subscriptions: BTreeSet<String>,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    pub paused: bool,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().to_string(),
            key: key.key().to_string(),
            application: key.application().to_string(),
            subscriptions: key.subscriptions().clone(),
            revoked: key.is_revoked(),
            revoked_at: key.revoked_at(),
            paused: key.is_paused(),
            expired: key.is_expired(),
            expire_at: key.expire_at(),
            created_at: key.created_at(),
            updated_at: key.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionListQuery {
    /// Comma separated statuses; all subscriptions when absent
    pub status: Option<String>,
    pub application: Option<String>,
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSubscribeQuery {
    pub application: String,
    pub plan: String,
    pub request: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSubscribeQuery {
    pub plan: String,
    /// Message to the API publisher
    pub request: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionBody {
    pub id: Option<String>,
    pub starting_at: Option<DateTime<Utc>>,
    pub ending_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessSubscriptionBody {
    pub id: Option<String>,
    pub accepted: bool,
    pub reason: Option<String>,
    pub starting_at: Option<DateTime<Utc>>,
    pub ending_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TransferSubscriptionBody {
    pub id: Option<String>,
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

fn ensure_same_id(body_id: Option<&str>, path_id: &str) -> Result<(), ApiError> {
    match body_id {
        Some(id) if id != path_id => Err(ApiError::bad_request(format!(
            "Subscription id '{}' does not match the path",
            id
        ))
        .with_param("id")),
        _ => Ok(()),
    }
}

fn criteria(
    query: SubscriptionListQuery,
    base: SubscriptionCriteria,
) -> Result<SubscriptionCriteria, ApiError> {
    let statuses = parse_list(query.status.as_deref(), "status", SubscriptionStatus::parse)?;
    Ok(SubscriptionCriteria {
        application: base.application.or(query.application),
        plan: query.plan,
        ..base
    }
    .with_statuses(statuses))
}

/// GET /management/apis/{api}/subscriptions
pub async fn list_api_subscriptions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Query(query): Query<SubscriptionListQuery>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::READ)
        .await?;
    state.services.apis.find_by_id(&api).await?;

    let criteria = criteria(query, SubscriptionCriteria::for_api(api.as_str()))?;
    Ok(Json(state.services.subscriptions.search(&criteria).await?))
}

/// POST /management/apis/{api}/subscriptions?application=&plan=
///
/// A subscription made by an API publisher is accepted straight away.
pub async fn create_api_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Query(query): Query<ApiSubscribeQuery>,
) -> Result<Created<Subscription>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::CREATE)
        .await?;
    state.services.plans.find_by_id(&api, &query.plan).await?;

    let subscriptions = &state.services.subscriptions;
    let mut subscription = subscriptions
        .create(
            NewSubscription {
                plan: query.plan,
                application: query.application,
                request: query.request,
            },
            user.id().as_str(),
        )
        .await?;

    if subscription.status() == SubscriptionStatus::Pending {
        subscription = subscriptions
            .process(
                subscription.id().as_str(),
                ProcessSubscription {
                    accepted: true,
                    ..Default::default()
                },
                user.id().as_str(),
            )
            .await?;
    }

    Ok(Created::new(
        format!("/management/apis/{}/subscriptions/{}", api, subscription.id()),
        subscription,
    ))
}

/// GET /management/apis/{api}/subscriptions/{subscription}
pub async fn get_api_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<Json<Subscription>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::READ)
        .await?;

    Ok(Json(state.services.subscriptions.find_for_api(&api, &id).await?))
}

/// PUT /management/apis/{api}/subscriptions/{subscription}
pub async fn update_api_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
    Json(body): Json<UpdateSubscriptionBody>,
) -> Result<Json<Subscription>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::UPDATE)
        .await?;
    ensure_same_id(body.id.as_deref(), &id)?;

    let subscriptions = &state.services.subscriptions;
    subscriptions.find_for_api(&api, &id).await?;
    let subscription = subscriptions
        .update(&id, body.starting_at, body.ending_at, user.id().as_str())
        .await?;

    Ok(Json(subscription))
}

/// POST /management/apis/{api}/subscriptions/{subscription}/_process
pub async fn process_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
    Json(body): Json<ProcessSubscriptionBody>,
) -> Result<Json<Subscription>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::UPDATE)
        .await?;
    ensure_same_id(body.id.as_deref(), &id)?;

    let subscriptions = &state.services.subscriptions;
    subscriptions.find_for_api(&api, &id).await?;
    let subscription = subscriptions
        .process(
            &id,
            ProcessSubscription {
                accepted: body.accepted,
                reason: body.reason,
                starting_at: body.starting_at,
                ending_at: body.ending_at,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Json(subscription))
}

/// POST /management/apis/{api}/subscriptions/{subscription}/status?status=CLOSED|PAUSED|RESUMED
pub async fn change_subscription_status(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Subscription>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::UPDATE)
        .await?;

    let subscriptions = &state.services.subscriptions;
    subscriptions.find_for_api(&api, &id).await?;
    let by = user.id().as_str();

    let subscription = match query.status.to_ascii_uppercase().as_str() {
        "CLOSED" => subscriptions.close(&id, by).await?,
        "PAUSED" => subscriptions.pause(&id, by).await?,
        "RESUMED" => subscriptions.resume(&id, by).await?,
        other => {
            return Err(
                ApiError::bad_request(format!("Unsupported subscription status '{}'", other))
                    .with_param("status"),
            )
        }
    };

    Ok(Json(subscription))
}

/// POST /management/apis/{api}/subscriptions/{subscription}/_transfer
pub async fn transfer_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
    Json(body): Json<TransferSubscriptionBody>,
) -> Result<Json<Subscription>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::UPDATE)
        .await?;
    ensure_same_id(body.id.as_deref(), &id)?;

    let subscriptions = &state.services.subscriptions;
    subscriptions.find_for_api(&api, &id).await?;
    let subscription = subscriptions
        .transfer(&id, &body.plan, user.id().as_str())
        .await?;

    Ok(Json(subscription))
}

/// GET /management/apis/{api}/subscriptions/{subscription}/apikeys
pub async fn list_api_keys(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::READ)
        .await?;

    let subscription = state.services.subscriptions.find_for_api(&api, &id).await?;
    let keys = state
        .services
        .api_keys
        .find_by_subscription(subscription.id().as_str())
        .await?;

    Ok(Json(keys.iter().map(ApiKeyResponse::from).collect()))
}

/// POST /management/apis/{api}/subscriptions/{subscription}/apikeys/_renew
pub async fn renew_api_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id)): Path<(String, String)>,
) -> Result<Created<ApiKeyResponse>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::UPDATE)
        .await?;

    let subscription = state.services.subscriptions.find_for_api(&api, &id).await?;
    let key = state
        .services
        .api_keys
        .renew(&subscription, user.id().as_str())
        .await?;

    Ok(Created::new(
        format!(
            "/management/apis/{}/subscriptions/{}/apikeys/{}",
            api,
            id,
            key.id()
        ),
        ApiKeyResponse::from(&key),
    ))
}

/// DELETE /management/apis/{api}/subscriptions/{subscription}/apikeys/{apikey}
pub async fn revoke_api_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id, key)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::DELETE)
        .await?;

    let subscription = state.services.subscriptions.find_for_api(&api, &id).await?;
    state
        .services
        .api_keys
        .revoke(&subscription, &key, user.id().as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /management/apis/{api}/subscriptions/{subscription}/apikeys/{apikey}/_reactivate
pub async fn reactivate_api_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((api, id, key)): Path<(String, String, String)>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    state
        .require(&user, RolePermission::ApiSubscription, &api, Actions::UPDATE)
        .await?;

    let subscription = state.services.subscriptions.find_for_api(&api, &id).await?;
    let key = state
        .services
        .api_keys
        .reactivate(&subscription, &key, user.id().as_str())
        .await?;

    Ok(Json(ApiKeyResponse::from(&key)))
}

/// GET /management/applications/{application}/subscriptions
pub async fn list_application_subscriptions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
    Query(query): Query<SubscriptionListQuery>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    state
        .require(
            &user,
            RolePermission::ApplicationSubscription,
            &application,
            Actions::READ,
        )
        .await?;
    state.services.applications.find_by_id(&application).await?;

    let criteria = criteria(
        query,
        SubscriptionCriteria::for_application(application.as_str()),
    )?;
    Ok(Json(state.services.subscriptions.search(&criteria).await?))
}

/// POST /management/applications/{application}/subscriptions?plan=
pub async fn create_application_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(application): Path<String>,
    Query(query): Query<ApplicationSubscribeQuery>,
) -> Result<Created<Subscription>, ApiError> {
    state
        .require(
            &user,
            RolePermission::ApplicationSubscription,
            &application,
            Actions::CREATE,
        )
        .await?;

    let subscription = state
        .services
        .subscriptions
        .create(
            NewSubscription {
                plan: query.plan,
                application: application.clone(),
                request: query.request,
            },
            user.id().as_str(),
        )
        .await?;

    Ok(Created::new(
        format!(
            "/management/applications/{}/subscriptions/{}",
            application,
            subscription.id()
        ),
        subscription,
    ))
}

/// GET /management/applications/{application}/subscriptions/{subscription}
pub async fn get_application_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((application, id)): Path<(String, String)>,
) -> Result<Json<Subscription>, ApiError> {
    state
        .require(
            &user,
            RolePermission::ApplicationSubscription,
            &application,
            Actions::READ,
        )
        .await?;

    Ok(Json(
        state
            .services
            .subscriptions
            .find_for_application(&application, &id)
            .await?,
    ))
}

/// DELETE /management/applications/{application}/subscriptions/{subscription}
///
/// Closes the subscription; it stays readable.
pub async fn close_application_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((application, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .require(
            &user,
            RolePermission::ApplicationSubscription,
            &application,
            Actions::DELETE,
        )
        .await?;

    let subscriptions = &state.services.subscriptions;
    subscriptions.find_for_application(&application, &id).await?;
    subscriptions.close(&id, user.id().as_str()).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /management/applications/{application}/subscriptions/{subscription}/apikeys
pub async fn list_application_api_keys(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((application, id)): Path<(String, String)>,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    state
        .require(
            &user,
            RolePermission::ApplicationSubscription,
            &application,
            Actions::READ,
        )
        .await?;

    let subscription = state
        .services
        .subscriptions
        .find_for_application(&application, &id)
        .await?;
    let keys = state
        .services
        .api_keys
        .find_by_subscription(subscription.id().as_str())
        .await?;

    Ok(Json(keys.iter().map(ApiKeyResponse::from).collect()))
}
