//! User entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

crate::entity_id!(
    /// User identifier
    UserId
);

/// Status of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// User is active and can log in
    #[default]
    Active,
    /// Registration not yet confirmed
    Pending,
    /// User was deleted; the record is kept for audit
    Archived,
}

impl UserStatus {
    /// Check if the user can log in
    pub fn can_login(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "PENDING" => Some(Self::Pending),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Pending => write!(f, "PENDING"),
            Self::Archived => write!(f, "ARCHIVED"),
        }
    }
}

/// A management user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    organization_id: String,
    /// Identity source, `memory` for users created by this service
    source: String,
    source_id: String,
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    /// Argon2 password hash
    #[serde(skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
    #[serde(default)]
    status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_connection_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(User, id);

impl User {
    /// Create a new user with a generated id
    pub fn new(organization_id: impl Into<String>, username: impl Into<String>) -> Self {
        let now = Utc::now();
        let username = username.into();

        Self {
            id: UserId::generate(),
            organization_id: organization_id.into(),
            source: "memory".to_string(),
            source_id: username.clone(),
            username,
            email: None,
            first_name: None,
            last_name: None,
            password_hash: None,
            status: UserStatus::Active,
            picture: None,
            last_connection_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = id;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_names(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>, source_id: impl Into<String>) -> Self {
        self.source = source.into();
        self.source_id = source_id.into();
        self
    }

    // Getters

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn picture(&self) -> Option<&str> {
        self.picture.as_deref()
    }

    pub fn last_connection_at(&self) -> Option<DateTime<Utc>> {
        self.last_connection_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// "First Last" when both names are known, the username otherwise
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.username.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.can_login()
    }

    // Mutators

    pub fn set_names(&mut self, first_name: Option<String>, last_name: Option<String>) {
        self.first_name = first_name;
        self.last_name = last_name;
        self.touch();
    }

    pub fn set_email(&mut self, email: Option<String>) {
        self.email = email;
        self.touch();
    }

    pub fn set_picture(&mut self, picture: Option<String>) {
        self.picture = picture;
        self.touch();
    }

    pub fn set_status(&mut self, status: UserStatus) {
        self.status = status;
        self.touch();
    }

    pub fn set_password_hash(&mut self, hash: impl Into<String>) {
        self.password_hash = Some(hash.into());
        self.touch();
    }

    pub fn record_connection(&mut self) {
        self.last_connection_at = Some(Utc::now());
    }

    /// Archive the account and strip personal data
    pub fn archive(&mut self) {
        self.status = UserStatus::Archived;
        self.email = None;
        self.first_name = None;
        self.last_name = None;
        self.picture = None;
        self.password_hash = None;
        self.username = format!("deleted-{}", self.id);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for User {
    type Key = UserId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
