//! Audit trail queries

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::parse_list;
use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, PageQuery, PagedResult};
use crate::domain::audit::{Audit, AuditEvent, AuditQuery, AuditReferenceType};
use crate::domain::role::{Actions, RolePermission};

#[derive(Debug, Deserialize)]
pub struct AuditSearchQuery {
    #[serde(rename = "type")]
    pub reference_type: Option<String>,
    /// Id of the API or application, with `type`
    pub reference_id: Option<String>,
    /// Comma separated event names
    pub events: Option<String>,
    pub user: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl AuditSearchQuery {
    fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            size: self.size,
        }
    }

    fn events(&self) -> Result<Vec<AuditEvent>, ApiError> {
        parse_list(self.events.as_deref(), "events", AuditEvent::parse)
    }
}

/// GET /management/audit
pub async fn search_audit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<AuditSearchQuery>,
) -> Result<Json<PagedResult<Audit>>, ApiError> {
    state
        .require(&user, RolePermission::EnvironmentAudit, "", Actions::READ)
        .await?;

    let reference_type = query
        .reference_type
        .as_deref()
        .map(|value| {
            AuditReferenceType::parse(value).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown audit reference type '{}'", value))
                    .with_param("type")
            })
        })
        .transpose()?;

    let audit_query = AuditQuery {
        reference_type,
        reference_ids: query.reference_id.clone().into_iter().collect(),
        events: query.events()?,
        user: query.user.clone(),
        from: query.from,
        to: query.to,
    };

    let page = state
        .services
        .audit
        .search(&audit_query, query.page_query().pageable())
        .await?;
    Ok(Json(PagedResult::from_page(page, |audit| audit)))
}

/// GET /management/apis/{api}/audit
pub async fn search_api_audit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(api): Path<String>,
    Query(query): Query<AuditSearchQuery>,
) -> Result<Json<PagedResult<Audit>>, ApiError> {
    state
        .require(&user, RolePermission::ApiAudit, &api, Actions::READ)
        .await?;
    state.services.apis.find_by_id(&api).await?;

    let audit_query = AuditQuery {
        reference_type: Some(AuditReferenceType::Api),
        reference_ids: vec![api],
        events: query.events()?,
        user: query.user.clone(),
        from: query.from,
        to: query.to,
    };

    let page = state
        .services
        .audit
        .search(&audit_query, query.page_query().pageable())
        .await?;
    Ok(Json(PagedResult::from_page(page, |audit| audit)))
}

/// GET /management/audit/events
pub async fn audit_events(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
) -> Json<Vec<&'static str>> {
    Json(
        state
            .services
            .audit
            .events()
            .iter()
            .map(AuditEvent::as_str)
            .collect(),
    )
}
