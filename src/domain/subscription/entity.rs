//! Subscription entity and its state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

crate::entity_id!(
    /// Subscription identifier
    SubscriptionId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    #[default]
    Pending,
    Accepted,
    Paused,
    Rejected,
    Closed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Paused => "PAUSED",
            Self::Rejected => "REJECTED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "ACCEPTED" => Some(Self::Accepted),
            "PAUSED" => Some(Self::Paused),
            "REJECTED" => Some(Self::Rejected),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Rejected and closed subscriptions never come back
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Closed)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application subscribed to an API through a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    id: SubscriptionId,
    api: String,
    plan: String,
    application: String,
    #[serde(default)]
    status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    subscribed_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    processed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    starting_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ending_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paused_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    closed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(Subscription, id);

impl Subscription {
    /// Create a pending subscription
    pub fn new(
        api: impl Into<String>,
        plan: impl Into<String>,
        application: impl Into<String>,
        subscribed_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: SubscriptionId::generate(),
            api: api.into(),
            plan: plan.into(),
            application: application.into(),
            status: SubscriptionStatus::Pending,
            request: None,
            reason: None,
            subscribed_by: subscribed_by.into(),
            processed_by: None,
            processed_at: None,
            starting_at: None,
            ending_at: None,
            paused_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_request(mut self, request: Option<String>) -> Self {
        self.request = request;
        self
    }

    // Getters

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    pub fn request(&self) -> Option<&str> {
        self.request.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn subscribed_by(&self) -> &str {
        &self.subscribed_by
    }

    pub fn processed_by(&self) -> Option<&str> {
        self.processed_by.as_deref()
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn starting_at(&self) -> Option<DateTime<Utc>> {
        self.starting_at
    }

    pub fn ending_at(&self) -> Option<DateTime<Utc>> {
        self.ending_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Accepted | SubscriptionStatus::Paused
        )
    }

    // Transitions

    /// Accept a pending subscription
    pub fn accept(
        &mut self,
        processed_by: impl Into<String>,
        starting_at: Option<DateTime<Utc>>,
        ending_at: Option<DateTime<Utc>>,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        self.ensure_pending()?;
        let now = Utc::now();

        self.status = SubscriptionStatus::Accepted;
        self.processed_by = Some(processed_by.into());
        self.processed_at = Some(now);
        self.starting_at = Some(starting_at.unwrap_or(now));
        self.ending_at = ending_at;
        self.reason = reason;
        self.touch();
        Ok(())
    }

    /// Reject a pending subscription
    pub fn reject(
        &mut self,
        processed_by: impl Into<String>,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        self.ensure_pending()?;

        self.status = SubscriptionStatus::Rejected;
        self.processed_by = Some(processed_by.into());
        self.processed_at = Some(Utc::now());
        self.reason = reason;
        self.touch();
        Ok(())
    }

    /// Change the validity window of an accepted subscription
    pub fn update_dates(
        &mut self,
        starting_at: Option<DateTime<Utc>>,
        ending_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Accepted {
            return Err(DomainError::subscription_not_updatable(&self.id));
        }

        if let Some(starting_at) = starting_at {
            self.starting_at = Some(starting_at);
        }
        self.ending_at = ending_at;
        self.touch();
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::subscription_not_closable(&self.id));
        }

        let now = Utc::now();
        self.status = SubscriptionStatus::Closed;
        self.closed_at = Some(now);
        if self.ending_at.is_none_or(|ending_at| ending_at > now) {
            self.ending_at = Some(now);
        }
        self.touch();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Accepted {
            return Err(DomainError::invalid_state(format!(
                "Subscription {} can not be paused from status {}",
                self.id, self.status
            )));
        }

        self.status = SubscriptionStatus::Paused;
        self.paused_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Paused {
            return Err(DomainError::subscription_not_paused(&self.id));
        }

        self.status = SubscriptionStatus::Accepted;
        self.paused_at = None;
        self.touch();
        Ok(())
    }

    /// Move an accepted subscription to another plan of the same API
    pub fn transfer(&mut self, plan: impl Into<String>) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Accepted {
            return Err(DomainError::invalid_state(format!(
                "Subscription {} must be accepted to be transferred",
                self.id
            )));
        }

        self.plan = plan.into();
        self.touch();
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Pending {
            return Err(DomainError::subscription_already_processed(&self.id));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Subscription {
    type Key = SubscriptionId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Search filters for subscriptions
#[derive(Debug, Clone, Default)]
pub struct SubscriptionCriteria {
    pub api: Option<String>,
    pub application: Option<String>,
    pub plan: Option<String>,
    /// Empty means every status
    pub statuses: Vec<SubscriptionStatus>,
}

impl SubscriptionCriteria {
    pub fn for_api(api: impl Into<String>) -> Self {
        Self {
            api: Some(api.into()),
            ..Default::default()
        }
    }

    pub fn for_application(application: impl Into<String>) -> Self {
        Self {
            application: Some(application.into()),
            ..Default::default()
        }
    }

    pub fn for_plan(plan: impl Into<String>) -> Self {
        Self {
            plan: Some(plan.into()),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<SubscriptionStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn matches(&self, subscription: &Subscription) -> bool {
        self.api.as_deref().is_none_or(|api| subscription.api() == api)
            && self
                .application
                .as_deref()
                .is_none_or(|app| subscription.application() == app)
            && self.plan.as_deref().is_none_or(|plan| subscription.plan() == plan)
            && (self.statuses.is_empty() || self.statuses.contains(&subscription.status()))
    }
}
