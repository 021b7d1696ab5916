//! Service wiring
//!
//! Builds every repository from one storage backend and the services on top of
//! them, in dependency order.

use std::sync::Arc;

use crate::domain::alert::AlertTriggerRepository;
use crate::domain::api::ApiRepository;
use crate::domain::api_key::ApiKeyRepository;
use crate::domain::application::ApplicationRepository;
use crate::domain::async_job::AsyncJobRepository;
use crate::domain::audit::AuditRepository;
use crate::domain::group::GroupRepository;
use crate::domain::membership::MembershipRepository;
use crate::domain::plan::PlanRepository;
use crate::domain::role::RoleRepository;
use crate::domain::subscription::SubscriptionRepository;
use crate::domain::user::UserRepository;
use crate::domain::DomainError;
use crate::infrastructure::alert::{AlertService, StorageAlertTriggerRepository};
use crate::infrastructure::api::{ApiService, StorageApiRepository};
use crate::infrastructure::api_key::{ApiKeyGenerator, ApiKeyService, StorageApiKeyRepository};
use crate::infrastructure::application::{ApplicationService, StorageApplicationRepository};
use crate::infrastructure::async_job::{AsyncJobService, StorageAsyncJobRepository};
use crate::infrastructure::audit::{AuditService, StorageAuditRepository};
use crate::infrastructure::group::{GroupService, StorageGroupRepository};
use crate::infrastructure::membership::{MembershipService, StorageMembershipRepository};
use crate::infrastructure::permission::PermissionService;
use crate::infrastructure::plan::{PlanService, StoragePlanRepository};
use crate::infrastructure::role::{RoleService, StorageRoleRepository};
use crate::infrastructure::storage::StorageFactory;
use crate::infrastructure::subscription::{StorageSubscriptionRepository, SubscriptionService};
use crate::infrastructure::user::{Argon2Hasher, StorageUserRepository, UserService};

/// One repository per entity
#[derive(Debug, Clone)]
pub struct Repositories {
    pub apis: Arc<dyn ApiRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub alerts: Arc<dyn AlertTriggerRepository>,
    pub audits: Arc<dyn AuditRepository>,
    pub jobs: Arc<dyn AsyncJobRepository>,
}

impl Repositories {
    pub async fn from_factory(factory: &StorageFactory) -> Result<Self, DomainError> {
        Ok(Self {
            apis: Arc::new(StorageApiRepository::new(factory.create("apis").await?)),
            plans: Arc::new(StoragePlanRepository::new(factory.create("plans").await?)),
            subscriptions: Arc::new(StorageSubscriptionRepository::new(
                factory.create("subscriptions").await?,
            )),
            api_keys: Arc::new(StorageApiKeyRepository::new(factory.create("api_keys").await?)),
            applications: Arc::new(StorageApplicationRepository::new(
                factory.create("applications").await?,
            )),
            users: Arc::new(StorageUserRepository::new(factory.create("users").await?)),
            roles: Arc::new(StorageRoleRepository::new(factory.create("roles").await?)),
            memberships: Arc::new(StorageMembershipRepository::new(
                factory.create("memberships").await?,
            )),
            groups: Arc::new(StorageGroupRepository::new(factory.create("groups").await?)),
            alerts: Arc::new(StorageAlertTriggerRepository::new(
                factory.create("alert_triggers").await?,
            )),
            audits: Arc::new(StorageAuditRepository::new(factory.create("audits").await?)),
            jobs: Arc::new(StorageAsyncJobRepository::new(factory.create("async_jobs").await?)),
        })
    }

    pub async fn in_memory() -> Result<Self, DomainError> {
        Self::from_factory(&StorageFactory::in_memory()).await
    }
}

/// Tenant and feature settings the services need
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub organization_id: String,
    pub environment_id: String,
    pub alerts_enabled: bool,
    pub api_key_prefix: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            organization_id: "DEFAULT".to_string(),
            environment_id: "DEFAULT".to_string(),
            alerts_enabled: true,
            api_key_prefix: crate::infrastructure::api_key::DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Every management service, sharing one set of repositories
#[derive(Debug, Clone)]
pub struct Services {
    pub audit: Arc<AuditService>,
    pub roles: Arc<RoleService>,
    pub memberships: Arc<MembershipService>,
    pub permissions: Arc<PermissionService>,
    pub users: Arc<UserService>,
    pub api_keys: Arc<ApiKeyService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub plans: Arc<PlanService>,
    pub jobs: Arc<AsyncJobService>,
    pub groups: Arc<GroupService>,
    pub alerts: Arc<AlertService>,
    pub apis: Arc<ApiService>,
    pub applications: Arc<ApplicationService>,
}

impl Services {
    pub fn new(repos: &Repositories, settings: &ServiceSettings) -> Self {
        let audit = Arc::new(AuditService::new(
            repos.audits.clone(),
            &settings.organization_id,
            &settings.environment_id,
        ));
        let roles = Arc::new(RoleService::new(
            repos.roles.clone(),
            repos.memberships.clone(),
            audit.clone(),
        ));
        let memberships = Arc::new(MembershipService::new(
            repos.memberships.clone(),
            repos.roles.clone(),
            repos.users.clone(),
            audit.clone(),
        ));
        let permissions = Arc::new(PermissionService::new(
            repos.memberships.clone(),
            repos.roles.clone(),
            repos.apis.clone(),
            repos.applications.clone(),
            &settings.organization_id,
            &settings.environment_id,
        ));
        let users = Arc::new(UserService::new(
            repos.users.clone(),
            repos.roles.clone(),
            memberships.clone(),
            Arc::new(Argon2Hasher::default()),
            audit.clone(),
            &settings.organization_id,
            &settings.environment_id,
        ));
        let api_keys = Arc::new(
            ApiKeyService::new(
                repos.api_keys.clone(),
                repos.subscriptions.clone(),
                audit.clone(),
            )
            .with_generator(ApiKeyGenerator::new(&settings.api_key_prefix)),
        );
        let subscriptions = Arc::new(SubscriptionService::new(
            repos.subscriptions.clone(),
            repos.plans.clone(),
            repos.applications.clone(),
            api_keys.clone(),
            audit.clone(),
        ));
        let plans = Arc::new(PlanService::new(
            repos.plans.clone(),
            subscriptions.clone(),
            audit.clone(),
        ));
        let jobs = Arc::new(AsyncJobService::new(
            repos.jobs.clone(),
            &settings.environment_id,
        ));
        let groups = Arc::new(GroupService::new(
            repos.groups.clone(),
            repos.apis.clone(),
            repos.applications.clone(),
            memberships.clone(),
            permissions.clone(),
            jobs.clone(),
            audit.clone(),
            &settings.environment_id,
        ));
        let alerts = Arc::new(AlertService::new(
            repos.alerts.clone(),
            audit.clone(),
            settings.alerts_enabled,
        ));
        let apis = Arc::new(ApiService::new(
            repos.apis.clone(),
            groups.clone(),
            memberships.clone(),
            permissions.clone(),
            plans.clone(),
            subscriptions.clone(),
            alerts.clone(),
            audit.clone(),
            &settings.environment_id,
        ));
        let applications = Arc::new(ApplicationService::new(
            repos.applications.clone(),
            groups.clone(),
            memberships.clone(),
            permissions.clone(),
            subscriptions.clone(),
            api_keys.clone(),
            audit.clone(),
            &settings.environment_id,
        ));

        Self {
            audit,
            roles,
            memberships,
            permissions,
            users,
            api_keys,
            subscriptions,
            plans,
            jobs,
            groups,
            alerts,
            apis,
            applications,
        }
    }

    /// In-memory services with the system roles seeded
    pub async fn in_memory(settings: &ServiceSettings) -> Result<Self, DomainError> {
        let services = Self::new(&Repositories::in_memory().await?, settings);
        services.roles.initialize().await?;
        Ok(services)
    }
}
