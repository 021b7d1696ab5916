//! Async job entity

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// Async job identifier
    AsyncJobId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AsyncJobType {
    GroupAssociation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AsyncJobStatus {
    #[default]
    Pending,
    Success,
    Error,
    Timeout,
}

impl AsyncJobStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "SUCCESS" => Some(Self::Success),
            "ERROR" => Some(Self::Error),
            "TIMEOUT" => Some(Self::Timeout),
            _ => None,
        }
    }
}

/// Long running work started by a request and tracked until completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncJob {
    id: AsyncJobId,
    source_id: String,
    environment_id: String,
    initiator_id: String,
    #[serde(rename = "type")]
    job_type: AsyncJobType,
    #[serde(default)]
    status: AsyncJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    upper_limit: u64,
    #[serde(default)]
    counter: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    dead_line: DateTime<Utc>,
}

crate::identity_eq!(AsyncJob, id);

impl AsyncJob {
    pub fn new(
        job_type: AsyncJobType,
        source_id: impl Into<String>,
        environment_id: impl Into<String>,
        initiator_id: impl Into<String>,
        upper_limit: u64,
        time_to_live: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: AsyncJobId::generate(),
            source_id: source_id.into(),
            environment_id: environment_id.into(),
            initiator_id: initiator_id.into(),
            job_type,
            status: AsyncJobStatus::Pending,
            error_message: None,
            upper_limit,
            counter: 0,
            created_at: now,
            updated_at: now,
            dead_line: now + time_to_live,
        }
    }

    pub fn with_dead_line(mut self, dead_line: DateTime<Utc>) -> Self {
        self.dead_line = dead_line;
        self
    }

    // Getters

    pub fn id(&self) -> &AsyncJobId {
        &self.id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn initiator_id(&self) -> &str {
        &self.initiator_id
    }

    pub fn job_type(&self) -> AsyncJobType {
        self.job_type
    }

    pub fn status(&self) -> AsyncJobStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn upper_limit(&self) -> u64 {
        self.upper_limit
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn dead_line(&self) -> DateTime<Utc> {
        self.dead_line
    }

    /// Still pending past its dead line
    pub fn is_late(&self) -> bool {
        self.is_late_at(Utc::now())
    }

    pub fn is_late_at(&self, now: DateTime<Utc>) -> bool {
        self.status == AsyncJobStatus::Pending && now > self.dead_line
    }

    // Mutators

    pub fn increment(&mut self) {
        self.counter = self.counter.saturating_add(1);
        self.touch();
    }

    pub fn set_counter(&mut self, counter: u64) {
        self.counter = counter;
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = AsyncJobStatus::Success;
        self.touch();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = AsyncJobStatus::Error;
        self.error_message = Some(message.into());
        self.touch();
    }

    pub fn time_out(&mut self) {
        self.status = AsyncJobStatus::Timeout;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for AsyncJob {
    type Key = AsyncJobId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Async job search filters
#[derive(Debug, Clone, Default)]
pub struct AsyncJobCriteria {
    pub initiator_id: Option<String>,
    pub status: Option<AsyncJobStatus>,
    pub job_type: Option<AsyncJobType>,
    pub source_id: Option<String>,
}

impl AsyncJobCriteria {
    pub fn matches(&self, job: &AsyncJob) -> bool {
        self.initiator_id
            .as_deref()
            .is_none_or(|initiator| job.initiator_id() == initiator)
            && self.status.is_none_or(|status| job.status() == status)
            && self.job_type.is_none_or(|job_type| job.job_type() == job_type)
            && self
                .source_id
                .as_deref()
                .is_none_or(|source| job.source_id() == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> AsyncJob {
        AsyncJob::new(
            AsyncJobType::GroupAssociation,
            "group-1",
            "DEFAULT",
            "user-1",
            10,
            Duration::minutes(5),
        )
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();

        assert_eq!(job.status(), AsyncJobStatus::Pending);
        assert_eq!(job.counter(), 0);
        assert!(!job.is_late());
    }

    #[test]
    fn test_is_late() {
        let job = job();
        let after = job.dead_line() + Duration::seconds(1);

        assert!(job.is_late_at(after));
        assert!(!job.is_late_at(job.dead_line()));
    }

    #[test]
    fn test_finished_job_is_never_late() {
        let mut job = job();
        job.complete();

        assert!(!job.is_late_at(job.dead_line() + Duration::hours(1)));
    }

    #[test]
    fn test_fail_records_message() {
        let mut job = job();
        job.increment();
        job.fail("boom");

        assert_eq!(job.status(), AsyncJobStatus::Error);
        assert_eq!(job.error_message(), Some("boom"));
        assert_eq!(job.counter(), 1);
    }

    #[test]
    fn test_criteria() {
        let job = job();

        assert!(AsyncJobCriteria {
            initiator_id: Some("user-1".into()),
            status: Some(AsyncJobStatus::Pending),
            ..Default::default()
        }
        .matches(&job));
        assert!(!AsyncJobCriteria {
            initiator_id: Some("user-2".into()),
            ..Default::default()
        }
        .matches(&job));
    }
}
