//! Application service

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::application::{
    ApiKeyMode, AppSettings, Application, ApplicationCriteria, ApplicationId,
    ApplicationRepository, ApplicationSettings, ApplicationStatus, ApplicationType,
    OAuthClientSettings,
};
use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::group::GroupEventRule;
use crate::domain::membership::MembershipReferenceType;
use crate::domain::subscription::SubscriptionCriteria;
use crate::domain::DomainError;
use crate::infrastructure::api_key::{ApiKeyGenerator, ApiKeyService};
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::group::GroupService;
use crate::infrastructure::membership::MembershipService;
use crate::infrastructure::permission::PermissionService;
use crate::infrastructure::subscription::SubscriptionService;

/// OAuth client settings as requested; the credentials are generated
#[derive(Debug, Clone, Default)]
pub struct OAuthClientRequest {
    pub application_type: ApplicationType,
    pub grant_types: Vec<String>,
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub name: String,
    pub description: String,
    pub domain: Option<String>,
    pub groups: BTreeSet<String>,
    pub picture: Option<String>,
    pub app: Option<AppSettings>,
    pub oauth: Option<OAuthClientRequest>,
    pub api_key_mode: Option<ApiKeyMode>,
}

/// Mutable application fields; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UpdateApplication {
    pub name: Option<String>,
    pub description: Option<String>,
    pub domain: Option<String>,
    pub groups: Option<BTreeSet<String>>,
    pub picture: Option<String>,
    pub app: Option<AppSettings>,
    pub oauth: Option<OAuthClientRequest>,
    pub api_key_mode: Option<ApiKeyMode>,
    pub disable_membership_notifications: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationQuery {
    pub name: Option<String>,
    /// Defaults to active applications
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug)]
pub struct ApplicationService {
    repository: Arc<dyn ApplicationRepository>,
    groups: Arc<GroupService>,
    memberships: Arc<MembershipService>,
    permissions: Arc<PermissionService>,
    subscriptions: Arc<SubscriptionService>,
    api_keys: Arc<ApiKeyService>,
    audit: Arc<AuditService>,
    generator: ApiKeyGenerator,
    environment_id: String,
}

impl ApplicationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        groups: Arc<GroupService>,
        memberships: Arc<MembershipService>,
        permissions: Arc<PermissionService>,
        subscriptions: Arc<SubscriptionService>,
        api_keys: Arc<ApiKeyService>,
        audit: Arc<AuditService>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            groups,
            memberships,
            permissions,
            subscriptions,
            api_keys,
            audit,
            generator: ApiKeyGenerator::default(),
            environment_id: environment_id.into(),
        }
    }

    pub async fn create(
        &self,
        request: NewApplication,
        user: &str,
    ) -> Result<Application, DomainError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Application name is required"));
        }
        self.memberships.ensure_member_exists(user).await?;

        let oauth = request.oauth.map(|oauth| self.new_oauth_client(oauth));
        let settings = ApplicationSettings::from_parts(request.app, oauth)?;

        if let Some(client_id) = settings.client_id() {
            self.ensure_client_id_available(client_id, None).await?;
        }

        self.groups.ensure_exist(&request.groups).await?;
        let groups = self
            .groups
            .with_event_groups(request.groups, GroupEventRule::ApplicationCreate)
            .await?;

        let application = Application::new(&self.environment_id, name, settings)
            .with_description(request.description)
            .with_domain(request.domain)
            .with_groups(groups)
            .with_picture(request.picture)
            .with_api_key_mode(request.api_key_mode.unwrap_or_default());

        let application = self.repository.create(application).await?;
        if let Err(e) = self
            .memberships
            .set_primary_owner(
                MembershipReferenceType::Application,
                application.id().as_str(),
                user,
            )
            .await
        {
            warn!(application_id = %application.id(), error = %e, "Primary owner not set, dropping application");
            self.repository.delete(application.id()).await?;
            return Err(e);
        }

        info!(application_id = %application.id(), "Application created");
        self.record(AuditEvent::ApplicationCreated, &application, None, user)
            .await;

        Ok(application)
    }

    /// An application by id, archived ones included
    pub async fn find_by_id(&self, id: &str) -> Result<Application, DomainError> {
        self.repository
            .get(&ApplicationId::new(id))
            .await?
            .ok_or_else(|| DomainError::application_not_found(id))
    }

    /// Applications the user is a member of, directly or through a group
    pub async fn find_by_user(
        &self,
        user: &str,
        query: ApplicationQuery,
    ) -> Result<Vec<Application>, DomainError> {
        let criteria = ApplicationCriteria {
            environment_id: Some(self.environment_id.clone()),
            name: query.name,
            status: Some(query.status.unwrap_or(ApplicationStatus::Active)),
            ..Default::default()
        };
        let applications = self.repository.search(&criteria).await?;

        if self.permissions.is_environment_admin(user).await? {
            return Ok(applications);
        }

        let member_of: BTreeSet<String> = self
            .memberships
            .get_reference_ids_by_member(user, MembershipReferenceType::Application)
            .await?
            .into_iter()
            .collect();
        let user_groups: BTreeSet<String> = self
            .memberships
            .get_reference_ids_by_member(user, MembershipReferenceType::Group)
            .await?
            .into_iter()
            .collect();

        Ok(applications
            .into_iter()
            .filter(|app| {
                member_of.contains(app.id().as_str()) || !app.groups().is_disjoint(&user_groups)
            })
            .collect())
    }

    pub async fn update(
        &self,
        id: &str,
        update: UpdateApplication,
        user: &str,
    ) -> Result<Application, DomainError> {
        let previous = self.find_active(id).await?;
        let mut application = previous.clone();

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("Application name is required"));
            }
            application.set_name(name.trim());
        }
        if let Some(description) = update.description {
            application.set_description(description);
        }
        if update.domain.is_some() {
            application.set_domain(update.domain);
        }
        if update.picture.is_some() {
            application.set_picture(update.picture);
        }
        if let Some(groups) = update.groups {
            self.groups.ensure_exist(&groups).await?;
            application.set_groups(groups);
        }
        if let Some(mode) = update.api_key_mode {
            application.set_api_key_mode(mode)?;
        }
        if let Some(disabled) = update.disable_membership_notifications {
            application.set_disable_membership_notifications(disabled);
        }

        match (update.app, update.oauth, previous.settings()) {
            (None, None, _) => {}
            (Some(app), None, ApplicationSettings::App(_)) => {
                application.set_settings(ApplicationSettings::App(app));
            }
            (None, Some(oauth), ApplicationSettings::Oauth(current)) => {
                application.set_settings(ApplicationSettings::Oauth(OAuthClientSettings {
                    application_type: oauth.application_type,
                    client_id: current.client_id.clone(),
                    client_secret: current.client_secret.clone(),
                    grant_types: oauth.grant_types,
                    redirect_uris: oauth.redirect_uris,
                }));
            }
            _ => {
                return Err(DomainError::validation(
                    "Application settings can not change between 'app' and 'oauth'",
                ))
            }
        }

        if let Some(client_id) = application.client_id() {
            self.ensure_client_id_available(client_id, Some(application.id()))
                .await?;
        }

        let application = self.repository.update(application).await?;
        self.record(
            AuditEvent::ApplicationUpdated,
            &application,
            Some(&previous),
            user,
        )
        .await;

        Ok(application)
    }

    /// Generate a new OAuth client secret
    pub async fn renew_client_secret(
        &self,
        id: &str,
        user: &str,
    ) -> Result<Application, DomainError> {
        let previous = self.find_active(id).await?;
        let mut application = previous.clone();
        application.renew_client_secret(self.generator.generate_secret())?;

        let application = self.repository.update(application).await?;

        info!(application_id = id, "Client secret renewed");
        self.audit
            .create_application_audit_log(
                id,
                user,
                AuditEvent::ClientSecretRenewed,
                BTreeMap::from([(AuditProperty::Application, id.to_string())]),
                Vec::new(),
            )
            .await;

        Ok(application)
    }

    /// Archive an application, ending its subscriptions, keys and memberships
    pub async fn archive(&self, id: &str, user: &str) -> Result<Application, DomainError> {
        let previous = self.find_active(id).await?;
        let reason = format!("Application {} has been archived.", previous.name());

        for subscription in self
            .subscriptions
            .search(&SubscriptionCriteria::for_application(id))
            .await?
        {
            self.subscriptions
                .close_or_reject(&subscription, &reason, user)
                .await?;
        }

        let keys = self.api_keys.revoke_for_application(id).await?;
        let memberships = self
            .memberships
            .delete_reference(MembershipReferenceType::Application, id)
            .await?;

        let mut application = previous.clone();
        application.archive();
        let application = self.repository.update(application).await?;

        info!(application_id = id, keys, memberships, "Application archived");
        self.record(
            AuditEvent::ApplicationArchived,
            &application,
            Some(&previous),
            user,
        )
        .await;

        Ok(application)
    }

    async fn find_active(&self, id: &str) -> Result<Application, DomainError> {
        let application = self.find_by_id(id).await?;
        if !application.is_active() {
            return Err(DomainError::invalid_state(format!(
                "Application {} is archived",
                id
            )));
        }
        Ok(application)
    }

    fn new_oauth_client(&self, request: OAuthClientRequest) -> OAuthClientSettings {
        OAuthClientSettings {
            application_type: request.application_type,
            client_id: Uuid::new_v4().to_string(),
            client_secret: self.generator.generate_secret(),
            grant_types: request.grant_types,
            redirect_uris: request.redirect_uris,
        }
    }

    async fn ensure_client_id_available(
        &self,
        client_id: &str,
        excluded: Option<&ApplicationId>,
    ) -> Result<(), DomainError> {
        let taken = self
            .repository
            .search(&ApplicationCriteria {
                environment_id: Some(self.environment_id.clone()),
                status: Some(ApplicationStatus::Active),
                client_id: Some(client_id.to_string()),
                ..Default::default()
            })
            .await?
            .iter()
            .any(|app| Some(app.id()) != excluded);

        if taken {
            return Err(DomainError::client_id_already_exists(client_id));
        }
        Ok(())
    }

    async fn record(
        &self,
        event: AuditEvent,
        application: &Application,
        previous: Option<&Application>,
        user: &str,
    ) {
        self.audit
            .create_application_audit_log(
                application.id().as_str(),
                user,
                event,
                BTreeMap::from([(AuditProperty::Application, application.id().to_string())]),
                changes(previous, Some(application)),
            )
            .await;
    }
}
