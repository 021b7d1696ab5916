//! Application entity and related types

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

crate::entity_id!(
    /// Application identifier
    ApplicationId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Active,
    Archived,
}

impl ApplicationStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// How API keys are issued across the application's subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiKeyMode {
    #[default]
    Unspecified,
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    #[default]
    Simple,
    Browser,
    Web,
    Native,
    BackendToBackend,
}

/// Settings of a simple application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub app_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Settings of an OAuth client application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClientSettings {
    pub application_type: ApplicationType,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Exactly one of the simple or OAuth settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSettings {
    App(AppSettings),
    Oauth(OAuthClientSettings),
}

impl ApplicationSettings {
    /// Build settings from the two optional request halves
    pub fn from_parts(
        app: Option<AppSettings>,
        oauth: Option<OAuthClientSettings>,
    ) -> Result<Self, DomainError> {
        match (app, oauth) {
            (Some(app), None) => Ok(Self::App(app)),
            (None, Some(oauth)) => Ok(Self::Oauth(oauth)),
            _ => Err(DomainError::validation(
                "Application settings must contain exactly one of 'app' or 'oauth'",
            )),
        }
    }

    /// Non-empty client id, if any
    pub fn client_id(&self) -> Option<&str> {
        let client_id = match self {
            Self::App(app) => app.client_id.as_deref(),
            Self::Oauth(oauth) => Some(oauth.client_id.as_str()),
        };
        client_id.filter(|id| !id.trim().is_empty())
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self, Self::Oauth(_))
    }

    pub fn application_type(&self) -> ApplicationType {
        match self {
            Self::App(_) => ApplicationType::Simple,
            Self::Oauth(oauth) => oauth.application_type,
        }
    }
}

/// A consumer of APIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    id: ApplicationId,
    environment_id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
    #[serde(rename = "type", default)]
    application_type: ApplicationType,
    #[serde(default)]
    status: ApplicationStatus,
    #[serde(default)]
    groups: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
    settings: ApplicationSettings,
    #[serde(default)]
    api_key_mode: ApiKeyMode,
    #[serde(default)]
    disable_membership_notifications: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(Application, id);

impl Application {
    pub fn new(
        environment_id: impl Into<String>,
        name: impl Into<String>,
        settings: ApplicationSettings,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: ApplicationId::generate(),
            environment_id: environment_id.into(),
            name: name.into(),
            description: String::new(),
            domain: None,
            application_type: settings.application_type(),
            status: ApplicationStatus::Active,
            groups: BTreeSet::new(),
            picture: None,
            settings,
            api_key_mode: ApiKeyMode::Unspecified,
            disable_membership_notifications: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: ApplicationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_groups(mut self, groups: BTreeSet<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_picture(mut self, picture: Option<String>) -> Self {
        self.picture = picture;
        self
    }

    pub fn with_api_key_mode(mut self, mode: ApiKeyMode) -> Self {
        self.api_key_mode = mode;
        self
    }

    // Getters

    pub fn id(&self) -> &ApplicationId {
        &self.id
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn application_type(&self) -> ApplicationType {
        self.application_type
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn picture(&self) -> Option<&str> {
        self.picture.as_deref()
    }

    pub fn settings(&self) -> &ApplicationSettings {
        &self.settings
    }

    pub fn api_key_mode(&self) -> ApiKeyMode {
        self.api_key_mode
    }

    pub fn disable_membership_notifications(&self) -> bool {
        self.disable_membership_notifications
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status == ApplicationStatus::Active
    }

    pub fn client_id(&self) -> Option<&str> {
        self.settings.client_id()
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn set_domain(&mut self, domain: Option<String>) {
        self.domain = domain;
        self.touch();
    }

    pub fn set_picture(&mut self, picture: Option<String>) {
        self.picture = picture;
        self.touch();
    }

    pub fn set_groups(&mut self, groups: BTreeSet<String>) {
        self.groups = groups;
        self.touch();
    }

    pub fn add_group(&mut self, group: impl Into<String>) -> bool {
        let added = self.groups.insert(group.into());
        if added {
            self.touch();
        }
        added
    }

    pub fn remove_group(&mut self, group: &str) -> bool {
        let removed = self.groups.remove(group);
        if removed {
            self.touch();
        }
        removed
    }

    pub fn set_settings(&mut self, settings: ApplicationSettings) {
        self.application_type = settings.application_type();
        self.settings = settings;
        self.touch();
    }

    pub fn set_disable_membership_notifications(&mut self, disabled: bool) {
        self.disable_membership_notifications = disabled;
        self.touch();
    }

    /// The mode can be chosen once, while still unspecified
    pub fn set_api_key_mode(&mut self, mode: ApiKeyMode) -> Result<(), DomainError> {
        if mode == self.api_key_mode {
            return Ok(());
        }

        if self.api_key_mode != ApiKeyMode::Unspecified {
            return Err(DomainError::invalid_state(format!(
                "API key mode of application {} can no longer be changed",
                self.id
            )));
        }

        self.api_key_mode = mode;
        self.touch();
        Ok(())
    }

    /// Replace the OAuth client secret
    pub fn renew_client_secret(&mut self, secret: impl Into<String>) -> Result<(), DomainError> {
        match &mut self.settings {
            ApplicationSettings::Oauth(oauth) => {
                oauth.client_secret = secret.into();
                self.touch();
                Ok(())
            }
            ApplicationSettings::App(_) => Err(DomainError::validation(format!(
                "Application {} is not an OAuth client",
                self.id
            ))),
        }
    }

    pub fn archive(&mut self) {
        self.status = ApplicationStatus::Archived;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Application {
    type Key = ApplicationId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Search filters for applications
#[derive(Debug, Clone, Default)]
pub struct ApplicationCriteria {
    pub environment_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub group: Option<String>,
    pub client_id: Option<String>,
    pub ids: Option<BTreeSet<String>>,
}

impl ApplicationCriteria {
    pub fn matches(&self, application: &Application) -> bool {
        self.environment_id
            .as_deref()
            .is_none_or(|env| application.environment_id() == env)
            && self.name.as_deref().is_none_or(|name| {
                application
                    .name()
                    .to_lowercase()
                    .contains(&name.to_lowercase())
            })
            && self.status.is_none_or(|status| application.status() == status)
            && self
                .group
                .as_deref()
                .is_none_or(|group| application.groups().contains(group))
            && self
                .client_id
                .as_deref()
                .is_none_or(|client_id| application.client_id() == Some(client_id))
            && self
                .ids
                .as_ref()
                .is_none_or(|ids| ids.contains(application.id().as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(client_id: Option<&str>) -> ApplicationSettings {
        ApplicationSettings::App(AppSettings {
            app_type: Some("web".to_string()),
            client_id: client_id.map(str::to_string),
        })
    }

    fn oauth() -> ApplicationSettings {
        ApplicationSettings::Oauth(OAuthClientSettings {
            application_type: ApplicationType::BackendToBackend,
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            grant_types: vec!["client_credentials".to_string()],
            redirect_uris: vec![],
        })
    }

    #[test]
    fn test_defaults() {
        let app = Application::new("DEFAULT", "Mobile", simple(None));

        assert_eq!(app.api_key_mode(), ApiKeyMode::Unspecified);
        assert_eq!(app.status(), ApplicationStatus::Active);
        assert_eq!(app.application_type(), ApplicationType::Simple);
        assert!(app.client_id().is_none());
    }

    #[test]
    fn test_settings_from_parts() {
        assert!(ApplicationSettings::from_parts(None, None).is_err());
        assert!(ApplicationSettings::from_parts(Some(AppSettings::default()), None).is_ok());

        let both = ApplicationSettings::from_parts(
            Some(AppSettings::default()),
            match oauth() {
                ApplicationSettings::Oauth(o) => Some(o),
                _ => None,
            },
        );
        assert!(both.is_err());
    }

    #[test]
    fn test_blank_client_id_is_ignored() {
        assert_eq!(simple(Some("  ")).client_id(), None);
        assert_eq!(simple(Some("abc")).client_id(), Some("abc"));
        assert_eq!(oauth().client_id(), Some("client"));
    }

    #[test]
    fn test_oauth_type_comes_from_settings() {
        let app = Application::new("DEFAULT", "Backend", oauth());
        assert_eq!(app.application_type(), ApplicationType::BackendToBackend);
    }

    #[test]
    fn test_api_key_mode_changes_once() {
        let mut app = Application::new("DEFAULT", "Mobile", simple(None));

        app.set_api_key_mode(ApiKeyMode::Shared).unwrap();
        assert_eq!(app.api_key_mode(), ApiKeyMode::Shared);
        app.set_api_key_mode(ApiKeyMode::Shared).unwrap();
        assert!(app.set_api_key_mode(ApiKeyMode::Exclusive).is_err());
    }

    #[test]
    fn test_renew_secret() {
        let mut app = Application::new("DEFAULT", "Mobile", simple(None));
        assert!(app.renew_client_secret("new").is_err());

        let mut app = Application::new("DEFAULT", "Backend", oauth());
        app.renew_client_secret("new").unwrap();
        match app.settings() {
            ApplicationSettings::Oauth(o) => assert_eq!(o.client_secret, "new"),
            _ => panic!("expected oauth settings"),
        }
    }

    #[test]
    fn test_criteria() {
        let mut app = Application::new("DEFAULT", "Mobile", simple(Some("abc")));

        let criteria = ApplicationCriteria {
            name: Some("mob".to_string()),
            status: Some(ApplicationStatus::Active),
            client_id: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(criteria.matches(&app));

        app.archive();
        assert!(!criteria.matches(&app));
    }

    #[test]
    fn test_settings_serialization() {
        let json = serde_json::to_value(simple(Some("abc"))).unwrap();
        assert_eq!(json["app"]["client_id"], "abc");
        assert_eq!(json["app"]["type"], "web");
    }
}
