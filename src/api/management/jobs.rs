//! Background jobs started by the caller

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::async_job::{AsyncJob, AsyncJobCriteria, AsyncJobStatus, AsyncJobType};
use crate::domain::DomainError;

#[derive(Debug, Clone, Serialize)]
pub struct AsyncJobResponse {
    pub id: String,
    pub source_id: String,
    pub initiator_id: String,
    #[serde(rename = "type")]
    pub job_type: AsyncJobType,
    pub status: AsyncJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub upper_limit: u64,
    pub counter: u64,
    pub is_late: bool,
    pub dead_line: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AsyncJob> for AsyncJobResponse {
    fn from(job: &AsyncJob) -> Self {
        Self {
            id: job.id().to_string(),
            source_id: job.source_id().to_string(),
            initiator_id: job.initiator_id().to_string(),
            job_type: job.job_type(),
            status: job.status(),
            error_message: job.error_message().map(String::from),
            upper_limit: job.upper_limit(),
            counter: job.counter(),
            is_late: job.is_late(),
            dead_line: job.dead_line(),
            created_at: job.created_at(),
            updated_at: job.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub status: Option<AsyncJobStatus>,
    #[serde(rename = "type")]
    pub job_type: Option<AsyncJobType>,
    pub source_id: Option<String>,
}

/// GET /management/async-jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<AsyncJobResponse>>, ApiError> {
    let mut jobs = state
        .services
        .jobs
        .search(&AsyncJobCriteria {
            initiator_id: Some(user.id().to_string()),
            status: query.status,
            job_type: query.job_type,
            source_id: query.source_id,
        })
        .await?;
    jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

    Ok(Json(jobs.iter().map(AsyncJobResponse::from).collect()))
}

/// GET /management/async-jobs/{job}
///
/// Jobs of other users are hidden unless the caller administers the environment.
pub async fn get_job(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<AsyncJobResponse>, ApiError> {
    let job = state.services.jobs.find_by_id(&id).await?;

    if job.initiator_id() != user.id().as_str()
        && !state
            .services
            .permissions
            .is_environment_admin(user.id().as_str())
            .await?
    {
        return Err(DomainError::async_job_not_found(&id).into());
    }

    Ok(Json(AsyncJobResponse::from(&job)))
}
