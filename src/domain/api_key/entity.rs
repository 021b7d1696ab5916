//! API key entity

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

crate::entity_id!(
    /// API key identifier
    ApiKeyId
);

/// A key issued to an application for one or more subscriptions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    id: ApiKeyId,
    key: String,
    /// sha256 of the key, used for constant-time verification
    key_hash: String,
    application: String,
    #[serde(default)]
    subscriptions: BTreeSet<String>,
    #[serde(default)]
    revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    days_to_expiration_on_last_notification: Option<u32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

crate::identity_eq!(ApiKey, id);

impl ApiKey {
    pub fn new(
        key: impl Into<String>,
        key_hash: impl Into<String>,
        application: impl Into<String>,
        subscription: impl Into<String>,
        expire_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: ApiKeyId::generate(),
            key: key.into(),
            key_hash: key_hash.into(),
            application: application.into(),
            subscriptions: BTreeSet::from([subscription.into()]),
            revoked: false,
            revoked_at: None,
            paused: false,
            expire_at,
            days_to_expiration_on_last_notification: None,
            created_at: now,
            updated_at: now,
        }
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn subscriptions(&self) -> &BTreeSet<String> {
        &self.subscriptions
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    pub fn days_to_expiration_on_last_notification(&self) -> Option<u32> {
        self.days_to_expiration_on_last_notification
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|expire_at| expire_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Usable by the gateway: not revoked, not paused, not expired
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.paused && !self.is_expired()
    }

    pub fn is_shared(&self) -> bool {
        self.subscriptions.len() > 1
    }

    pub fn covers(&self, subscription: &str) -> bool {
        self.subscriptions.contains(subscription)
    }

    // Mutators

    pub fn add_subscription(&mut self, subscription: impl Into<String>) {
        if self.subscriptions.insert(subscription.into()) {
            self.touch();
        }
    }

    pub fn remove_subscription(&mut self, subscription: &str) {
        if self.subscriptions.remove(subscription) {
            self.touch();
        }
    }

    pub fn revoke(&mut self) -> Result<(), DomainError> {
        if self.revoked {
            return Err(DomainError::invalid_state(format!(
                "API key {} is already revoked",
                self.id
            )));
        }

        self.revoked = true;
        self.revoked_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Clear revocation and expiration
    pub fn reactivate(&mut self) -> Result<(), DomainError> {
        if !self.revoked && !self.is_expired() {
            return Err(DomainError::invalid_state(format!(
                "API key {} is neither revoked nor expired",
                self.id
            )));
        }

        self.revoked = false;
        self.revoked_at = None;
        self.expire_at = None;
        self.touch();
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.touch();
    }

    pub fn set_expire_at(&mut self, expire_at: Option<DateTime<Utc>>) {
        self.expire_at = expire_at;
        self.touch();
    }

    /// Shorten the expiration to `expire_at` unless the key already expires sooner
    pub fn expire_no_later_than(&mut self, expire_at: DateTime<Utc>) -> bool {
        if self.expire_at.is_none_or(|current| current > expire_at) {
            self.set_expire_at(Some(expire_at));
            true
        } else {
            false
        }
    }

    pub fn set_days_to_expiration_on_last_notification(&mut self, days: Option<u32>) {
        self.days_to_expiration_on_last_notification = days;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for ApiKey {
    type Key = ApiKeyId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn key() -> ApiKey {
        ApiKey::new("apim_abc", "sha256$00", "app-1", "sub-1", None)
    }

    #[test]
    fn test_new_key_is_valid() {
        let key = key();

        assert!(key.is_valid());
        assert!(key.covers("sub-1"));
        assert!(!key.is_shared());
        assert!(!key.is_expired());
    }

    #[test]
    fn test_revoke_twice_fails() {
        let mut key = key();

        key.revoke().unwrap();
        assert!(!key.is_valid());
        assert!(key.revoked_at().is_some());
        assert!(matches!(
            key.revoke(),
            Err(DomainError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_paused_key_is_invalid() {
        let mut key = key();
        key.set_paused(true);
        assert!(!key.is_valid());
    }

    #[test]
    fn test_expiration() {
        let mut key = key();
        key.set_expire_at(Some(Utc::now() - Duration::seconds(1)));

        assert!(key.is_expired());
        assert!(!key.is_valid());
    }

    #[test]
    fn test_reactivate() {
        let mut key = key();
        assert!(key.reactivate().is_err());

        key.revoke().unwrap();
        key.reactivate().unwrap();
        assert!(key.is_valid());
        assert!(key.expire_at().is_none());
    }

    #[test]
    fn test_expire_no_later_than() {
        let mut key = key();
        let soon = Utc::now() + Duration::hours(2);

        assert!(key.expire_no_later_than(soon));
        assert_eq!(key.expire_at(), Some(soon));

        assert!(!key.expire_no_later_than(soon + Duration::hours(1)));
        assert_eq!(key.expire_at(), Some(soon));
    }

    #[test]
    fn test_shared_key() {
        let mut key = key();
        key.add_subscription("sub-2");
        assert!(key.is_shared());

        key.remove_subscription("sub-1");
        assert!(!key.is_shared());
        assert!(key.covers("sub-2"));
    }
}
