//! Subscription service
//!
//! Drives a subscription from its request to its closing and keeps the API keys
//! of the subscription in line with its status.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::application::{ApplicationId, ApplicationRepository};
use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::plan::{Plan, PlanId, PlanRepository, PlanStatus};
use crate::domain::subscription::{
    Subscription, SubscriptionCriteria, SubscriptionId, SubscriptionRepository,
    SubscriptionStatus,
};
use crate::domain::DomainError;
use crate::infrastructure::api_key::ApiKeyService;
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::observability::record_subscription_processed;

/// User recorded as processor of auto-validated subscriptions
pub const SYSTEM_USER: &str = "system";

/// Rejection reason of a pending subscription closed by its subscriber
pub const PENDING_CLOSED_REASON: &str = "Subscription has been closed.";

#[derive(Debug, Clone, Default)]
pub struct NewSubscription {
    pub plan: String,
    pub application: String,
    pub request: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessSubscription {
    pub accepted: bool,
    pub reason: Option<String>,
    pub starting_at: Option<DateTime<Utc>>,
    pub ending_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SubscriptionService {
    repository: Arc<dyn SubscriptionRepository>,
    plans: Arc<dyn PlanRepository>,
    applications: Arc<dyn ApplicationRepository>,
    api_keys: Arc<ApiKeyService>,
    audit: Arc<AuditService>,
}

impl SubscriptionService {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        plans: Arc<dyn PlanRepository>,
        applications: Arc<dyn ApplicationRepository>,
        api_keys: Arc<ApiKeyService>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repository,
            plans,
            applications,
            api_keys,
            audit,
        }
    }

    /// Subscribe an application to a plan; auto-validated plans accept right away
    pub async fn create(
        &self,
        request: NewSubscription,
        user: &str,
    ) -> Result<Subscription, DomainError> {
        let plan = self.find_plan(&request.plan).await?;

        match plan.status() {
            PlanStatus::Closed => return Err(DomainError::plan_already_closed(plan.id())),
            PlanStatus::Staging => return Err(DomainError::plan_not_yet_published(plan.id())),
            PlanStatus::Deprecated => return Err(DomainError::plan_not_subscribable(plan.id())),
            PlanStatus::Published => {}
        }

        if plan.is_keyless() {
            return Err(DomainError::plan_not_subscribable(plan.id()));
        }

        let application = self
            .applications
            .get(&ApplicationId::new(request.application.as_str()))
            .await?
            .ok_or_else(|| DomainError::application_not_found(&request.application))?;

        if !application.is_active() {
            return Err(DomainError::validation(format!(
                "Application [{}] is archived",
                application.id()
            )));
        }

        let existing = self
            .repository
            .search(
                &SubscriptionCriteria::for_plan(plan.id().as_str())
                    .with_statuses(vec![
                        SubscriptionStatus::Pending,
                        SubscriptionStatus::Accepted,
                        SubscriptionStatus::Paused,
                    ]),
            )
            .await?;
        if existing
            .iter()
            .any(|s| s.application() == application.id().as_str())
        {
            return Err(DomainError::plan_already_subscribed(plan.id()));
        }

        let comment = request.request.filter(|r| !r.trim().is_empty());
        if plan.comment_required() && comment.is_none() {
            return Err(DomainError::validation(format!(
                "Plan [{}] requires a subscription comment",
                plan.id()
            )));
        }

        let subscription = Subscription::new(
            plan.api(),
            plan.id().as_str(),
            application.id().as_str(),
            user,
        )
        .with_request(comment);

        let subscription = self.repository.create(subscription).await?;

        info!(
            subscription_id = %subscription.id(),
            plan_id = %plan.id(),
            application_id = %application.id(),
            "Subscription created"
        );
        self.record(AuditEvent::SubscriptionCreated, &subscription, None, user)
            .await;

        if plan.is_auto_validated() {
            return self
                .process(
                    subscription.id().as_str(),
                    ProcessSubscription {
                        accepted: true,
                        ..Default::default()
                    },
                    SYSTEM_USER,
                )
                .await;
        }

        Ok(subscription)
    }

    /// Accept or reject a pending subscription
    pub async fn process(
        &self,
        id: &str,
        process: ProcessSubscription,
        user: &str,
    ) -> Result<Subscription, DomainError> {
        let previous = self.find_by_id(id).await?;
        let plan = self.find_plan(previous.plan()).await?;

        if plan.is_closed() {
            return Err(DomainError::plan_already_closed(plan.id()));
        }

        let mut subscription = previous.clone();

        let status = if process.accepted {
            subscription.accept(user, process.starting_at, process.ending_at, process.reason)?;
            "accepted"
        } else {
            subscription.reject(user, process.reason)?;
            "rejected"
        };

        let subscription = self.repository.update(subscription).await?;

        if process.accepted {
            let application = self
                .applications
                .get(&ApplicationId::new(subscription.application()))
                .await?
                .ok_or_else(|| DomainError::application_not_found(subscription.application()))?;
            self.api_keys.issue(&application, &subscription, user).await?;
        }

        record_subscription_processed(status);
        info!(subscription_id = %subscription.id(), status, "Subscription processed");
        self.record(
            AuditEvent::SubscriptionUpdated,
            &subscription,
            Some(&previous),
            user,
        )
        .await;

        Ok(subscription)
    }

    /// Change the validity window of an accepted subscription
    pub async fn update(
        &self,
        id: &str,
        starting_at: Option<DateTime<Utc>>,
        ending_at: Option<DateTime<Utc>>,
        user: &str,
    ) -> Result<Subscription, DomainError> {
        let previous = self.find_by_id(id).await?;
        let mut subscription = previous.clone();
        subscription.update_dates(starting_at, ending_at)?;

        let subscription = self.repository.update(subscription).await?;

        if let Some(ending_at) = subscription.ending_at() {
            self.api_keys
                .expire_for_subscription(subscription.id().as_str(), ending_at)
                .await?;
        }

        self.record(
            AuditEvent::SubscriptionUpdated,
            &subscription,
            Some(&previous),
            user,
        )
        .await;

        Ok(subscription)
    }

    /// Close an open subscription. A pending one is rejected instead.
    pub async fn close(&self, id: &str, user: &str) -> Result<Subscription, DomainError> {
        let previous = self.find_by_id(id).await?;

        if previous.status() == SubscriptionStatus::Pending {
            return self
                .process(
                    id,
                    ProcessSubscription {
                        accepted: false,
                        reason: Some(PENDING_CLOSED_REASON.to_string()),
                        ..Default::default()
                    },
                    user,
                )
                .await;
        }

        let mut subscription = previous.clone();
        subscription.close()?;

        let subscription = self.repository.update(subscription).await?;
        self.api_keys
            .revoke_for_subscription(&subscription, user)
            .await?;

        info!(subscription_id = %subscription.id(), "Subscription closed");
        self.record(
            AuditEvent::SubscriptionClosed,
            &subscription,
            Some(&previous),
            user,
        )
        .await;

        Ok(subscription)
    }

    /// Close an open subscription, or reject it while it is still pending
    pub async fn close_or_reject(
        &self,
        subscription: &Subscription,
        reason: &str,
        user: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        match subscription.status() {
            SubscriptionStatus::Accepted | SubscriptionStatus::Paused => self
                .close(subscription.id().as_str(), user)
                .await
                .map(Some),
            SubscriptionStatus::Pending => self
                .process(
                    subscription.id().as_str(),
                    ProcessSubscription {
                        accepted: false,
                        reason: Some(reason.to_string()),
                        ..Default::default()
                    },
                    user,
                )
                .await
                .map(Some),
            SubscriptionStatus::Rejected | SubscriptionStatus::Closed => Ok(None),
        }
    }

    pub async fn pause(&self, id: &str, user: &str) -> Result<Subscription, DomainError> {
        let previous = self.find_by_id(id).await?;
        let mut subscription = previous.clone();
        subscription.pause()?;

        let subscription = self.repository.update(subscription).await?;
        self.api_keys
            .set_paused_for_subscription(subscription.id().as_str(), true)
            .await?;

        self.record(
            AuditEvent::SubscriptionPaused,
            &subscription,
            Some(&previous),
            user,
        )
        .await;

        Ok(subscription)
    }

    pub async fn resume(&self, id: &str, user: &str) -> Result<Subscription, DomainError> {
        let previous = self.find_by_id(id).await?;
        let mut subscription = previous.clone();
        subscription.resume()?;

        let subscription = self.repository.update(subscription).await?;
        self.api_keys
            .set_paused_for_subscription(subscription.id().as_str(), false)
            .await?;

        self.record(
            AuditEvent::SubscriptionResumed,
            &subscription,
            Some(&previous),
            user,
        )
        .await;

        Ok(subscription)
    }

    /// Move an accepted subscription to another published plan of the same API
    pub async fn transfer(
        &self,
        id: &str,
        plan_id: &str,
        user: &str,
    ) -> Result<Subscription, DomainError> {
        let previous = self.find_by_id(id).await?;
        let current_plan = self.find_plan(previous.plan()).await?;
        let target = self.find_plan(plan_id).await?;

        if !target.belongs_to(previous.api()) {
            return Err(DomainError::validation(format!(
                "Plan [{}] does not belong to API [{}]",
                plan_id,
                previous.api()
            )));
        }
        if target.status() != PlanStatus::Published {
            return Err(DomainError::validation(format!(
                "Plan [{}] is not published",
                plan_id
            )));
        }
        if target.security() != current_plan.security() {
            return Err(DomainError::validation(format!(
                "Plan [{}] does not use the same security as plan [{}]",
                plan_id,
                current_plan.id()
            )));
        }

        let mut subscription = previous.clone();
        subscription.transfer(target.id().as_str())?;
        let subscription = self.repository.update(subscription).await?;

        self.record(
            AuditEvent::SubscriptionTransferred,
            &subscription,
            Some(&previous),
            user,
        )
        .await;

        Ok(subscription)
    }

    pub async fn delete(&self, id: &str, user: &str) -> Result<(), DomainError> {
        let subscription = self.find_by_id(id).await?;

        self.api_keys
            .delete_for_subscription(subscription.id().as_str())
            .await?;
        self.repository.delete(subscription.id()).await?;

        self.audit
            .create_api_audit_log(
                subscription.api(),
                user,
                AuditEvent::SubscriptionDeleted,
                properties(&subscription),
                changes(Some(&subscription), None),
            )
            .await;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Subscription, DomainError> {
        self.repository
            .get(&SubscriptionId::new(id))
            .await?
            .ok_or_else(|| DomainError::subscription_not_found(id))
    }

    /// A subscription seen through one of its API's routes
    pub async fn find_for_api(&self, api: &str, id: &str) -> Result<Subscription, DomainError> {
        let subscription = self.find_by_id(id).await?;
        if subscription.api() != api {
            return Err(DomainError::subscription_not_found(id));
        }
        Ok(subscription)
    }

    /// A subscription seen through one of its application's routes
    pub async fn find_for_application(
        &self,
        application: &str,
        id: &str,
    ) -> Result<Subscription, DomainError> {
        let subscription = self.find_by_id(id).await?;
        if subscription.application() != application {
            return Err(DomainError::subscription_not_found(id));
        }
        Ok(subscription)
    }

    pub async fn search(
        &self,
        criteria: &SubscriptionCriteria,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.repository.search(criteria).await
    }

    async fn find_plan(&self, id: &str) -> Result<Plan, DomainError> {
        self.plans
            .get(&PlanId::new(id))
            .await?
            .ok_or_else(|| DomainError::plan_not_found(id))
    }

    async fn record(
        &self,
        event: AuditEvent,
        subscription: &Subscription,
        previous: Option<&Subscription>,
        user: &str,
    ) {
        self.audit
            .create_api_audit_log(
                subscription.api(),
                user,
                event,
                properties(subscription),
                changes(previous, Some(subscription)),
            )
            .await;
    }
}

fn properties(subscription: &Subscription) -> BTreeMap<AuditProperty, String> {
    BTreeMap::from([
        (AuditProperty::Subscription, subscription.id().to_string()),
        (AuditProperty::Plan, subscription.plan().to_string()),
        (AuditProperty::Application, subscription.application().to_string()),
    ])
}
