//! API service
//!
//! API definitions, their visibility to users, the gateway lifecycle and the
//! cascade that runs when an API is deleted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::alert::AlertReferenceType;
use crate::domain::api::{
    context_paths_overlap, normalize_context_path, Api, ApiCriteria, ApiId, ApiLifecycleState,
    ApiRepository, LifecycleState, Visibility,
};
use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::group::GroupEventRule;
use crate::domain::membership::MembershipReferenceType;
use crate::domain::plan::PlanStatus;
use crate::domain::subscription::SubscriptionCriteria;
use crate::domain::{DomainError, Page, Pageable};
use crate::infrastructure::alert::AlertService;
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::group::GroupService;
use crate::infrastructure::membership::MembershipService;
use crate::infrastructure::observability::record_api_lifecycle_change;
use crate::infrastructure::permission::PermissionService;
use crate::infrastructure::plan::PlanService;
use crate::infrastructure::subscription::SubscriptionService;

#[derive(Debug, Clone, Default)]
pub struct NewApi {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub context_path: String,
    pub endpoint: Option<String>,
    pub groups: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

/// Mutable API fields; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UpdateApi {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub context_path: Option<String>,
    pub endpoint: Option<String>,
    pub visibility: Option<Visibility>,
    pub api_lifecycle_state: Option<ApiLifecycleState>,
    pub tags: Option<BTreeSet<String>>,
    pub labels: Option<Vec<String>>,
    pub categories: Option<BTreeSet<String>>,
    pub groups: Option<BTreeSet<String>>,
    pub picture: Option<String>,
    pub disable_membership_notifications: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQuery {
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    pub lifecycle_state: Option<LifecycleState>,
    pub tag: Option<String>,
    pub label: Option<String>,
    pub group: Option<String>,
}

/// Whether the gateway runs the latest definition
#[derive(Debug, Clone, Serialize)]
pub struct ApiState {
    pub api_id: String,
    pub is_synchronized: bool,
}

#[derive(Debug)]
pub struct ApiService {
    repository: Arc<dyn ApiRepository>,
    groups: Arc<GroupService>,
    memberships: Arc<MembershipService>,
    permissions: Arc<PermissionService>,
    plans: Arc<PlanService>,
    subscriptions: Arc<SubscriptionService>,
    alerts: Arc<AlertService>,
    audit: Arc<AuditService>,
    environment_id: String,
}

impl ApiService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn ApiRepository>,
        groups: Arc<GroupService>,
        memberships: Arc<MembershipService>,
        permissions: Arc<PermissionService>,
        plans: Arc<PlanService>,
        subscriptions: Arc<SubscriptionService>,
        alerts: Arc<AlertService>,
        audit: Arc<AuditService>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            groups,
            memberships,
            permissions,
            plans,
            subscriptions,
            alerts,
            audit,
            environment_id: environment_id.into(),
        }
    }

    pub async fn create(&self, new_api: NewApi, user: &str) -> Result<Api, DomainError> {
        let name = required(&new_api.name, "name")?;
        let version = required(&new_api.version, "version")?;
        let context_path = normalize_context_path(&new_api.context_path)?;
        self.memberships.ensure_member_exists(user).await?;

        self.ensure_context_path_available(&context_path, None)
            .await?;
        self.groups.ensure_exist(&new_api.groups).await?;
        let groups = self
            .groups
            .with_event_groups(new_api.groups, GroupEventRule::ApiCreate)
            .await?;

        let mut api = Api::new(&self.environment_id, name, version, context_path)
            .with_groups(groups)
            .with_tags(new_api.tags);
        if let Some(description) = new_api.description {
            api = api.with_description(description);
        }
        if let Some(endpoint) = new_api.endpoint {
            api = api.with_endpoint(endpoint);
        }

        let api = self.repository.create(api).await?;
        if let Err(e) = self
            .memberships
            .set_primary_owner(MembershipReferenceType::Api, api.id().as_str(), user)
            .await
        {
            warn!(api_id = %api.id(), error = %e, "Primary owner not set, dropping API");
            self.repository.delete(api.id()).await?;
            return Err(e);
        }

        info!(api_id = %api.id(), context_path = api.context_path(), "API created");
        self.record(AuditEvent::ApiCreated, &api, None, user).await;

        Ok(api)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Api, DomainError> {
        self.repository
            .get(&ApiId::new(id))
            .await?
            .ok_or_else(|| DomainError::api_not_found(id))
    }

    /// APIs visible to `user`, sorted by name; anonymous callers only see public APIs
    pub async fn search(
        &self,
        query: ApiQuery,
        user: Option<&str>,
        pageable: Pageable,
    ) -> Result<Page<Api>, DomainError> {
        let criteria = ApiCriteria {
            environment_id: Some(self.environment_id.clone()),
            name: query.name,
            visibility: query.visibility,
            lifecycle_state: query.lifecycle_state,
            tag: query.tag,
            label: query.label,
            group: query.group,
            ids: None,
        };
        let apis = self.repository.search(&criteria).await?;

        let visible = match user {
            Some(user) if self.permissions.is_environment_admin(user).await? => apis,
            Some(user) => {
                let member_of: BTreeSet<String> = self
                    .memberships
                    .get_reference_ids_by_member(user, MembershipReferenceType::Api)
                    .await?
                    .into_iter()
                    .collect();
                let user_groups: BTreeSet<String> = self
                    .memberships
                    .get_reference_ids_by_member(user, MembershipReferenceType::Group)
                    .await?
                    .into_iter()
                    .collect();

                apis.into_iter()
                    .filter(|api| {
                        api.visibility() == Visibility::Public
                            || member_of.contains(api.id().as_str())
                            || !api.groups().is_disjoint(&user_groups)
                    })
                    .collect()
            }
            None => apis
                .into_iter()
                .filter(|api| api.visibility() == Visibility::Public)
                .collect(),
        };

        Ok(Page::of(visible, pageable))
    }

    pub async fn update(&self, id: &str, update: UpdateApi, user: &str) -> Result<Api, DomainError> {
        let previous = self.find_by_id(id).await?;
        let mut api = previous.clone();

        if let Some(name) = update.name {
            api.set_name(required(&name, "name")?);
        }
        if let Some(version) = update.version {
            api.set_version(required(&version, "version")?);
        }
        if let Some(context_path) = update.context_path {
            let context_path = normalize_context_path(&context_path)?;
            self.ensure_context_path_available(&context_path, Some(api.id()))
                .await?;
            api.set_context_path(context_path);
        }
        if let Some(groups) = update.groups {
            self.groups.ensure_exist(&groups).await?;
            api.set_groups(groups);
        }
        if update.description.is_some() {
            api.set_description(update.description);
        }
        if update.endpoint.is_some() {
            api.set_endpoint(update.endpoint);
        }
        if let Some(visibility) = update.visibility {
            api.set_visibility(visibility);
        }
        if let Some(state) = update.api_lifecycle_state {
            api.set_api_lifecycle_state(state);
        }
        if let Some(tags) = update.tags {
            api.set_tags(tags);
        }
        if let Some(labels) = update.labels {
            api.set_labels(labels);
        }
        if let Some(categories) = update.categories {
            api.set_categories(categories);
        }
        if update.picture.is_some() {
            api.set_picture(update.picture);
        }
        if let Some(disabled) = update.disable_membership_notifications {
            api.set_disable_membership_notifications(disabled);
        }

        let api = self.repository.update(api).await?;
        self.record(AuditEvent::ApiUpdated, &api, Some(&previous), user)
            .await;

        Ok(api)
    }

    /// Delete a stopped API whose plans are all closed or staging, with everything it owns
    pub async fn delete(&self, id: &str, user: &str) -> Result<(), DomainError> {
        let api = self.find_by_id(id).await?;

        if api.is_started() {
            return Err(DomainError::api_running_state(api.id()));
        }

        let open_plans: Vec<String> = self
            .plans
            .find_by_api(id, &[PlanStatus::Published, PlanStatus::Deprecated])
            .await?
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        if !open_plans.is_empty() {
            return Err(DomainError::api_not_deletable(&open_plans));
        }

        let subscriptions = self
            .subscriptions
            .search(&SubscriptionCriteria::for_api(id))
            .await?;
        for subscription in &subscriptions {
            self.subscriptions
                .delete(subscription.id().as_str(), user)
                .await?;
        }
        let plans = self.plans.delete_by_api(id).await?;
        let memberships = self
            .memberships
            .delete_reference(MembershipReferenceType::Api, id)
            .await?;
        let alerts = self
            .alerts
            .delete_by_reference(AlertReferenceType::Api, id)
            .await?;

        self.repository.delete(api.id()).await?;

        info!(
            api_id = id,
            plans,
            subscriptions = subscriptions.len(),
            memberships,
            alerts,
            "API deleted"
        );
        self.audit
            .create_api_audit_log(
                id,
                user,
                AuditEvent::ApiDeleted,
                BTreeMap::from([(AuditProperty::Api, id.to_string())]),
                changes(Some(&api), None),
            )
            .await;

        Ok(())
    }

    pub async fn start(&self, id: &str, user: &str) -> Result<Api, DomainError> {
        self.change_lifecycle(id, LifecycleState::Started, AuditEvent::ApiStarted, user)
            .await
    }

    pub async fn stop(&self, id: &str, user: &str) -> Result<Api, DomainError> {
        self.change_lifecycle(id, LifecycleState::Stopped, AuditEvent::ApiStopped, user)
            .await
    }

    pub async fn deploy(&self, id: &str, user: &str) -> Result<Api, DomainError> {
        let previous = self.find_by_id(id).await?;
        let mut api = previous.clone();
        api.mark_deployed();

        let api = self.repository.update(api).await?;

        info!(api_id = id, "API deployed");
        self.record(AuditEvent::ApiDeployed, &api, Some(&previous), user)
            .await;

        Ok(api)
    }

    pub async fn state(&self, id: &str) -> Result<ApiState, DomainError> {
        let api = self.find_by_id(id).await?;
        Ok(ApiState {
            api_id: api.id().to_string(),
            is_synchronized: api.is_synchronized(),
        })
    }

    async fn change_lifecycle(
        &self,
        id: &str,
        state: LifecycleState,
        event: AuditEvent,
        user: &str,
    ) -> Result<Api, DomainError> {
        let previous = self.find_by_id(id).await?;

        if previous.lifecycle_state() == state {
            return Err(DomainError::invalid_state(format!(
                "API {} is already {}",
                id,
                state.as_str().to_lowercase()
            )));
        }

        let mut api = previous.clone();
        api.set_lifecycle_state(state);
        let api = self.repository.update(api).await?;

        record_api_lifecycle_change(state.as_str());
        info!(api_id = id, state = %state, "API lifecycle changed");
        self.record(event, &api, Some(&previous), user).await;

        Ok(api)
    }

    async fn ensure_context_path_available(
        &self,
        context_path: &str,
        excluded: Option<&ApiId>,
    ) -> Result<(), DomainError> {
        let apis = self
            .repository
            .search(&ApiCriteria {
                environment_id: Some(self.environment_id.clone()),
                ..Default::default()
            })
            .await?;

        let taken = apis.iter().any(|api| {
            Some(api.id()) != excluded && context_paths_overlap(api.context_path(), context_path)
        });

        if taken {
            return Err(DomainError::api_context_path_already_exists(context_path));
        }
        Ok(())
    }

    async fn record(&self, event: AuditEvent, api: &Api, previous: Option<&Api>, user: &str) {
        self.audit
            .create_api_audit_log(
                api.id().as_str(),
                user,
                event,
                BTreeMap::from([(AuditProperty::Api, api.id().to_string())]),
                changes(previous, Some(api)),
            )
            .await;
    }
}

fn required(value: &str, field: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("API {} is required", field)));
    }
    Ok(trimmed.to_string())
}
