//! Plan service
//!
//! Plan lifecycle (staging, published, deprecated, closed) and the ordering of
//! the published plans of an API.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::plan::{Plan, PlanId, PlanRepository, PlanSecurity, PlanStatus, PlanValidation};
use crate::domain::subscription::SubscriptionCriteria;
use crate::domain::DomainError;
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::subscription::SubscriptionService;

#[derive(Debug, Clone)]
pub struct CreatePlanRequest {
    pub name: String,
    pub description: String,
    pub security: PlanSecurity,
    pub validation: PlanValidation,
    pub characteristics: Vec<String>,
    pub excluded_groups: BTreeSet<String>,
    pub comment_required: bool,
    pub comment_message: Option<String>,
}

/// Mutable plan fields; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub validation: Option<PlanValidation>,
    pub characteristics: Option<Vec<String>>,
    pub excluded_groups: Option<BTreeSet<String>>,
    pub comment_required: Option<bool>,
    pub comment_message: Option<String>,
    pub order: Option<u32>,
}

#[derive(Debug)]
pub struct PlanService {
    repository: Arc<dyn PlanRepository>,
    subscriptions: Arc<SubscriptionService>,
    audit: Arc<AuditService>,
}

impl PlanService {
    pub fn new(
        repository: Arc<dyn PlanRepository>,
        subscriptions: Arc<SubscriptionService>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repository,
            subscriptions,
            audit,
        }
    }

    pub async fn create(
        &self,
        api: &str,
        request: CreatePlanRequest,
        user: &str,
    ) -> Result<Plan, DomainError> {
        if request.name.trim().is_empty() {
            return Err(DomainError::validation("Plan name is required"));
        }

        let plan = Plan::new(api, request.name.trim(), request.security)
            .with_description(request.description)
            .with_validation(request.validation)
            .with_characteristics(request.characteristics)
            .with_excluded_groups(request.excluded_groups)
            .with_comment(request.comment_required, request.comment_message);

        let plan = self.repository.create(plan).await?;

        info!(plan_id = %plan.id(), api_id = api, "Plan created");
        self.record(AuditEvent::PlanCreated, &plan, None, user).await;

        Ok(plan)
    }

    pub async fn update(
        &self,
        api: &str,
        id: &str,
        request: UpdatePlanRequest,
        user: &str,
    ) -> Result<Plan, DomainError> {
        let previous = self.find_by_id(api, id).await?;
        let mut plan = previous.clone();

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("Plan name is required"));
            }
            plan.set_name(name.trim());
        }
        if let Some(description) = request.description {
            plan.set_description(description);
        }
        if let Some(validation) = request.validation {
            plan.set_validation(validation);
        }
        if let Some(characteristics) = request.characteristics {
            plan.set_characteristics(characteristics);
        }
        if let Some(groups) = request.excluded_groups {
            plan.set_excluded_groups(groups);
        }
        if request.comment_required.is_some() || request.comment_message.is_some() {
            let required = request.comment_required.unwrap_or(previous.comment_required());
            let message = request
                .comment_message
                .or_else(|| previous.comment_message().map(str::to_string));
            plan.set_comment(required, message);
        }

        let reorder_to = request
            .order
            .filter(|order| *order != previous.order() && plan.is_published());
        if let Some(order) = request.order.filter(|_| !plan.is_published()) {
            plan.set_order(order);
        }

        let mut plan = self.repository.update(plan).await?;

        if let Some(order) = reorder_to {
            self.reorder(api, Some((plan.id().clone(), order))).await?;
            plan = self.find_by_id(api, id).await?;
        }

        self.record(AuditEvent::PlanUpdated, &plan, Some(&previous), user)
            .await;

        Ok(plan)
    }

    /// Publish a staging plan at the end of the published list
    pub async fn publish(&self, api: &str, id: &str, user: &str) -> Result<Plan, DomainError> {
        let previous = self.find_by_id(api, id).await?;

        match previous.status() {
            PlanStatus::Closed => return Err(DomainError::plan_already_closed(previous.id())),
            PlanStatus::Published => {
                return Err(DomainError::invalid_state(format!(
                    "Plan {} is already published",
                    previous.id()
                )))
            }
            PlanStatus::Deprecated => {
                return Err(DomainError::plan_already_deprecated(previous.id()))
            }
            PlanStatus::Staging => {}
        }

        let published = self.published(api).await?;

        if previous.is_keyless() && published.iter().any(Plan::is_keyless) {
            return Err(DomainError::validation(
                "A keyless plan is already published for this API",
            ));
        }

        let last = published.iter().map(Plan::order).max().unwrap_or(0);
        let mut plan = previous.clone();
        plan.publish(last + 1);

        let plan = self.repository.update(plan).await?;

        info!(plan_id = %plan.id(), order = plan.order(), "Plan published");
        self.record(AuditEvent::PlanPublished, &plan, Some(&previous), user)
            .await;

        Ok(plan)
    }

    pub async fn deprecate(&self, api: &str, id: &str, user: &str) -> Result<Plan, DomainError> {
        let previous = self.find_by_id(api, id).await?;

        if !previous.is_published() {
            return Err(DomainError::invalid_state(format!(
                "Plan {} can not be deprecated from status {}",
                previous.id(),
                previous.status()
            )));
        }

        let mut plan = previous.clone();
        plan.deprecate();
        let plan = self.repository.update(plan).await?;

        self.record(AuditEvent::PlanDeprecated, &plan, Some(&previous), user)
            .await;

        Ok(plan)
    }

    /// Close a plan along with its subscriptions
    pub async fn close(&self, api: &str, id: &str, user: &str) -> Result<Plan, DomainError> {
        let previous = self.find_by_id(api, id).await?;

        if previous.is_closed() {
            return Err(DomainError::plan_already_closed(previous.id()));
        }

        let reason = format!("Plan {} has been closed.", previous.name());
        let subscriptions = self
            .subscriptions
            .search(&SubscriptionCriteria::for_plan(previous.id().as_str()))
            .await?;
        for subscription in &subscriptions {
            self.subscriptions
                .close_or_reject(subscription, &reason, user)
                .await?;
        }

        let mut plan = previous.clone();
        plan.close();
        let plan = self.repository.update(plan).await?;
        self.reorder(api, None).await?;

        info!(
            plan_id = %plan.id(),
            subscriptions = subscriptions.len(),
            "Plan closed"
        );
        self.record(AuditEvent::PlanClosed, &plan, Some(&previous), user)
            .await;

        Ok(plan)
    }

    pub async fn delete(&self, api: &str, id: &str, user: &str) -> Result<(), DomainError> {
        let plan = self.find_by_id(api, id).await?;

        let subscriptions = self
            .subscriptions
            .search(&SubscriptionCriteria::for_plan(plan.id().as_str()))
            .await?;

        if matches!(plan.status(), PlanStatus::Published | PlanStatus::Deprecated)
            && !subscriptions.is_empty()
        {
            return Err(DomainError::plan_with_subscriptions(plan.id()));
        }

        for subscription in &subscriptions {
            self.subscriptions
                .delete(subscription.id().as_str(), user)
                .await?;
        }

        self.repository.delete(plan.id()).await?;
        self.reorder(api, None).await?;

        info!(plan_id = %plan.id(), api_id = api, "Plan deleted");
        self.audit
            .create_api_audit_log(
                api,
                user,
                AuditEvent::PlanDeleted,
                BTreeMap::from([(AuditProperty::Plan, plan.id().to_string())]),
                changes(Some(&plan), None),
            )
            .await;

        Ok(())
    }

    /// Remove every plan of an API without any state check
    pub async fn delete_by_api(&self, api: &str) -> Result<usize, DomainError> {
        let plans = self.repository.find_by_api(api).await?;
        for plan in &plans {
            self.repository.delete(plan.id()).await?;
        }
        Ok(plans.len())
    }

    /// Plans of an API, optionally restricted to some statuses
    pub async fn find_by_api(
        &self,
        api: &str,
        statuses: &[PlanStatus],
    ) -> Result<Vec<Plan>, DomainError> {
        let plans = self.repository.find_by_api(api).await?;
        Ok(plans
            .into_iter()
            .filter(|p| statuses.is_empty() || statuses.contains(&p.status()))
            .collect())
    }

    /// A plan reached through its API
    pub async fn find_by_id(&self, api: &str, id: &str) -> Result<Plan, DomainError> {
        let plan = self
            .repository
            .get(&PlanId::new(id))
            .await?
            .ok_or_else(|| DomainError::plan_not_found(id))?;

        if !plan.belongs_to(api) {
            return Err(DomainError::plan_not_found(id));
        }

        Ok(plan)
    }

    async fn published(&self, api: &str) -> Result<Vec<Plan>, DomainError> {
        self.find_by_api(api, &[PlanStatus::Published]).await
    }

    /// Give the published plans contiguous orders from 1, optionally moving one plan
    async fn reorder(&self, api: &str, moved: Option<(PlanId, u32)>) -> Result<(), DomainError> {
        let mut plans = self.published(api).await?;
        plans.sort_by_key(Plan::order);

        if let Some((id, order)) = moved {
            if let Some(index) = plans.iter().position(|p| p.id() == &id) {
                let plan = plans.remove(index);
                let position = (order.max(1) as usize - 1).min(plans.len());
                plans.insert(position, plan);
            }
        }

        for (index, mut plan) in plans.into_iter().enumerate() {
            let order = index as u32 + 1;
            if plan.order() != order {
                debug!(plan_id = %plan.id(), order, "Reordering plan");
                plan.set_order(order);
                self.repository.update(plan).await?;
            }
        }

        Ok(())
    }

    async fn record(&self, event: AuditEvent, plan: &Plan, previous: Option<&Plan>, user: &str) {
        self.audit
            .create_api_audit_log(
                plan.api(),
                user,
                event,
                BTreeMap::from([(AuditProperty::Plan, plan.id().to_string())]),
                changes(previous, Some(plan)),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{AppSettings, Application, ApplicationRepository, ApplicationSettings};
    use crate::domain::subscription::SubscriptionStatus;
    use crate::infrastructure::api_key::{ApiKeyService, StorageApiKeyRepository};
    use crate::infrastructure::application::StorageApplicationRepository;
    use crate::infrastructure::audit::StorageAuditRepository;
    use crate::infrastructure::plan::StoragePlanRepository;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::subscription::{
        NewSubscription, StorageSubscriptionRepository,
    };

    struct Fixture {
        service: PlanService,
        subscriptions: Arc<SubscriptionService>,
        applications: Arc<StorageApplicationRepository>,
    }

    fn fixture() -> Fixture {
        let plans = Arc::new(StoragePlanRepository::new(Arc::new(InMemoryStorage::new())));
        let subscription_repo = Arc::new(StorageSubscriptionRepository::new(Arc::new(
            InMemoryStorage::new(),
        )));
        let applications = Arc::new(StorageApplicationRepository::new(Arc::new(
            InMemoryStorage::new(),
        )));
        let audit = Arc::new(AuditService::new(
            Arc::new(StorageAuditRepository::new(Arc::new(InMemoryStorage::new()))),
            "DEFAULT",
            "DEFAULT",
        ));
        let api_keys = Arc::new(ApiKeyService::new(
            Arc::new(StorageApiKeyRepository::new(Arc::new(InMemoryStorage::new()))),
            subscription_repo.clone(),
            audit.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            subscription_repo,
            plans.clone(),
            applications.clone(),
            api_keys,
            audit.clone(),
        ));

        Fixture {
            service: PlanService::new(plans, subscriptions.clone(), audit),
            subscriptions,
            applications,
        }
    }

    fn request(name: &str, security: PlanSecurity) -> CreatePlanRequest {
        CreatePlanRequest {
            name: name.to_string(),
            description: String::new(),
            security,
            validation: PlanValidation::Manual,
            characteristics: Vec::new(),
            excluded_groups: BTreeSet::new(),
            comment_required: false,
            comment_message: None,
        }
    }

    async fn published(f: &Fixture, name: &str) -> Plan {
        let plan = f
            .service
            .create("api-1", request(name, PlanSecurity::ApiKey), "u1")
            .await
            .unwrap();
        f.service
            .publish("api-1", plan.id().as_str(), "u1")
            .await
            .unwrap()
    }

    async fn subscribe(f: &Fixture, plan: &Plan) -> String {
        let app = f
            .applications
            .create(Application::new(
                "DEFAULT",
                "App",
                ApplicationSettings::App(AppSettings::default()),
            ))
            .await
            .unwrap();
        f.subscriptions
            .create(
                NewSubscription {
                    plan: plan.id().to_string(),
                    application: app.id().to_string(),
                    request: None,
                },
                "u1",
            )
            .await
            .unwrap()
            .id()
            .to_string()
    }

    async fn orders(f: &Fixture) -> Vec<(String, u32)> {
        f.service
            .find_by_api("api-1", &[PlanStatus::Published])
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.name().to_string(), p.order()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_keyless_forces_auto() {
        let f = fixture();
        let plan = f
            .service
            .create("api-1", request("Free", PlanSecurity::KeyLess), "u1")
            .await
            .unwrap();

        assert_eq!(plan.validation(), PlanValidation::Auto);
        assert_eq!(plan.status(), PlanStatus::Staging);
        assert_eq!(plan.order(), 0);
    }

    #[tokio::test]
    async fn test_publish_appends_order() {
        let f = fixture();
        let gold = published(&f, "Gold").await;
        let silver = published(&f, "Silver").await;

        assert_eq!(gold.order(), 1);
        assert_eq!(silver.order(), 2);

        let err = f
            .service
            .publish("api-1", gold.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_single_published_keyless_plan() {
        let f = fixture();
        let first = f
            .service
            .create("api-1", request("Free", PlanSecurity::KeyLess), "u1")
            .await
            .unwrap();
        let second = f
            .service
            .create("api-1", request("Open", PlanSecurity::KeyLess), "u1")
            .await
            .unwrap();

        f.service
            .publish("api-1", first.id().as_str(), "u1")
            .await
            .unwrap();
        let err = f
            .service
            .publish("api-1", second.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_order_reorders() {
        let f = fixture();
        published(&f, "A").await;
        published(&f, "B").await;
        let c = published(&f, "C").await;

        let moved = f
            .service
            .update(
                "api-1",
                c.id().as_str(),
                UpdatePlanRequest {
                    order: Some(1),
                    ..Default::default()
                },
                "u1",
            )
            .await
            .unwrap();
        assert_eq!(moved.order(), 1);

        let mut orders = orders(&f).await;
        orders.sort_by_key(|(_, order)| *order);
        assert_eq!(
            orders,
            vec![("C".to_string(), 1), ("A".to_string(), 2), ("B".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_update_order_is_clamped() {
        let f = fixture();
        let a = published(&f, "A").await;
        published(&f, "B").await;

        let moved = f
            .service
            .update(
                "api-1",
                a.id().as_str(),
                UpdatePlanRequest {
                    order: Some(42),
                    ..Default::default()
                },
                "u1",
            )
            .await
            .unwrap();
        assert_eq!(moved.order(), 2);
    }

    #[tokio::test]
    async fn test_deprecate_requires_published() {
        let f = fixture();
        let staging = f
            .service
            .create("api-1", request("Gold", PlanSecurity::ApiKey), "u1")
            .await
            .unwrap();

        let err = f
            .service
            .deprecate("api-1", staging.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));

        let gold = f
            .service
            .publish("api-1", staging.id().as_str(), "u1")
            .await
            .unwrap();
        let deprecated = f
            .service
            .deprecate("api-1", gold.id().as_str(), "u1")
            .await
            .unwrap();
        assert_eq!(deprecated.status(), PlanStatus::Deprecated);
    }

    #[tokio::test]
    async fn test_deprecated_plan_cannot_be_republished() {
        let f = fixture();
        let gold = published(&f, "Gold").await;
        f.service
            .deprecate("api-1", gold.id().as_str(), "u1")
            .await
            .unwrap();

        let err = f
            .service
            .publish("api-1", gold.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        assert!(err.to_string().contains("already deprecated"));

        let plan = f.service.find_by_id("api-1", gold.id().as_str()).await.unwrap();
        assert_eq!(plan.status(), PlanStatus::Deprecated);
    }

    #[tokio::test]
    async fn test_close_rejects_pending_and_reorders() {
        let f = fixture();
        let a = published(&f, "A").await;
        published(&f, "B").await;
        let subscription = subscribe(&f, &a).await;

        let closed = f
            .service
            .close("api-1", a.id().as_str(), "u1")
            .await
            .unwrap();
        assert!(closed.is_closed());
        assert_eq!(closed.order(), 0);

        let rejected = f.subscriptions.find_by_id(&subscription).await.unwrap();
        assert_eq!(rejected.status(), SubscriptionStatus::Rejected);
        assert_eq!(rejected.reason(), Some("Plan A has been closed."));

        assert_eq!(orders(&f).await, vec![("B".to_string(), 1)]);

        let err = f
            .service
            .close("api-1", a.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_delete_published_with_subscriptions_fails() {
        let f = fixture();
        let a = published(&f, "A").await;
        subscribe(&f, &a).await;

        let err = f
            .service
            .delete("api-1", a.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));

        f.service.close("api-1", a.id().as_str(), "u1").await.unwrap();
        f.service.delete("api-1", a.id().as_str(), "u1").await.unwrap();
        assert!(f.service.find_by_id("api-1", a.id().as_str()).await.is_err());
    }

    #[tokio::test]
    async fn test_plan_through_wrong_api() {
        let f = fixture();
        let a = published(&f, "A").await;

        let err = f
            .service
            .find_by_id("api-2", a.id().as_str())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
