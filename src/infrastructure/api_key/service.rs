//! API key service
//!
//! Issues, renews, revokes and reactivates the keys attached to subscriptions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::application::{ApiKeyMode, Application};
use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::subscription::{
    Subscription, SubscriptionId, SubscriptionRepository, SubscriptionStatus,
};
use crate::domain::DomainError;
use crate::infrastructure::audit::AuditService;

use super::generator::ApiKeyGenerator;

/// Grace period left to the previous keys of a renewed subscription
pub const RENEWAL_GRACE_PERIOD_HOURS: i64 = 2;

#[derive(Debug)]
pub struct ApiKeyService {
    repository: Arc<dyn ApiKeyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    generator: ApiKeyGenerator,
    audit: Arc<AuditService>,
}

impl ApiKeyService {
    pub fn new(
        repository: Arc<dyn ApiKeyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repository,
            subscriptions,
            generator: ApiKeyGenerator::default(),
            audit,
        }
    }

    pub fn with_generator(mut self, generator: ApiKeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Key for a newly accepted subscription. Shared-mode applications reuse their key.
    pub async fn issue(
        &self,
        application: &Application,
        subscription: &Subscription,
        user: &str,
    ) -> Result<ApiKey, DomainError> {
        if application.api_key_mode() == ApiKeyMode::Shared {
            let shared = self
                .repository
                .find_by_application(application.id().as_str())
                .await?
                .into_iter()
                .find(|key| !key.is_revoked());

            if let Some(mut key) = shared {
                key.add_subscription(subscription.id().as_str());
                let key = self.repository.update(key).await?;
                debug!(api_key_id = %key.id(), subscription_id = %subscription.id(), "Shared API key reused");
                return Ok(key);
            }
        }

        self.generate(
            application.id().as_str(),
            subscription,
            subscription.ending_at(),
            user,
        )
        .await
    }

    pub async fn generate(
        &self,
        application: &str,
        subscription: &Subscription,
        expire_at: Option<DateTime<Utc>>,
        user: &str,
    ) -> Result<ApiKey, DomainError> {
        let generated = self.generator.generate();
        let key = ApiKey::new(
            generated.key,
            generated.hash,
            application,
            subscription.id().as_str(),
            expire_at,
        );

        let key = self.repository.create(key).await?;
        info!(api_key_id = %key.id(), subscription_id = %subscription.id(), "API key created");

        self.record(AuditEvent::ApiKeyCreated, subscription, &key, None, user)
            .await;

        Ok(key)
    }

    /// Issue a new key; the previous keys expire after a grace period
    pub async fn renew(&self, subscription: &Subscription, user: &str) -> Result<ApiKey, DomainError> {
        if !subscription.is_active() {
            return Err(DomainError::invalid_state(format!(
                "Subscription {} is not active",
                subscription.id()
            )));
        }

        let existing = self
            .repository
            .find_by_subscription(subscription.id().as_str())
            .await?;

        if existing.iter().any(|key| key.is_shared() && !key.is_revoked()) {
            return Err(DomainError::invalid_state(
                "A shared API key can not be renewed from a single subscription",
            ));
        }

        let renewed = self
            .generate(
                subscription.application(),
                subscription,
                subscription.ending_at(),
                user,
            )
            .await?;

        let grace_end = Utc::now() + Duration::hours(RENEWAL_GRACE_PERIOD_HOURS);
        for mut key in existing {
            if !key.is_revoked() && key.expire_no_later_than(grace_end) {
                self.repository.update(key).await?;
            }
        }

        self.record(AuditEvent::ApiKeyRenewed, subscription, &renewed, None, user)
            .await;

        Ok(renewed)
    }

    pub async fn revoke(
        &self,
        subscription: &Subscription,
        key_id: &str,
        user: &str,
    ) -> Result<ApiKey, DomainError> {
        let previous = self.find_for_subscription(subscription, key_id).await?;

        let mut key = previous.clone();
        key.revoke()?;
        let key = self.repository.update(key).await?;

        info!(api_key_id = %key.id(), "API key revoked");
        self.record(AuditEvent::ApiKeyRevoked, subscription, &key, Some(&previous), user)
            .await;

        Ok(key)
    }

    /// Bring back a revoked or expired key whose subscriptions are all accepted
    pub async fn reactivate(
        &self,
        subscription: &Subscription,
        key_id: &str,
        user: &str,
    ) -> Result<ApiKey, DomainError> {
        let previous = self.find_for_subscription(subscription, key_id).await?;

        for id in previous.subscriptions() {
            let status = self
                .subscriptions
                .get(&SubscriptionId::new(id.as_str()))
                .await?
                .map(|s| s.status());

            if status != Some(SubscriptionStatus::Accepted) {
                return Err(DomainError::invalid_state(format!(
                    "API key {} can not be reactivated, subscription {} is not accepted",
                    key_id, id
                )));
            }
        }

        let mut key = previous.clone();
        key.reactivate()?;
        let key = self.repository.update(key).await?;

        info!(api_key_id = %key.id(), "API key reactivated");
        self.record(AuditEvent::ApiKeyReactivated, subscription, &key, Some(&previous), user)
            .await;

        Ok(key)
    }

    /// Revoke the keys of a closed subscription. Shared keys stay alive while
    /// another of their subscriptions is still open.
    pub async fn revoke_for_subscription(
        &self,
        subscription: &Subscription,
        user: &str,
    ) -> Result<usize, DomainError> {
        let mut revoked = 0;

        for key in self
            .repository
            .find_by_subscription(subscription.id().as_str())
            .await?
        {
            if key.is_revoked() {
                continue;
            }

            if key.is_shared() && self.still_used(&key, subscription.id()).await? {
                continue;
            }

            let previous = key.clone();
            let mut key = key;
            key.revoke()?;
            let key = self.repository.update(key).await?;
            self.record(AuditEvent::ApiKeyRevoked, subscription, &key, Some(&previous), user)
                .await;
            revoked += 1;
        }

        Ok(revoked)
    }

    async fn still_used(&self, key: &ApiKey, closing: &SubscriptionId) -> Result<bool, DomainError> {
        for id in key.subscriptions() {
            if id.as_str() == closing.as_str() {
                continue;
            }
            let open = self
                .subscriptions
                .get(&SubscriptionId::new(id.as_str()))
                .await?
                .is_some_and(|s| !s.status().is_terminal());
            if open {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn set_paused_for_subscription(
        &self,
        subscription: &str,
        paused: bool,
    ) -> Result<(), DomainError> {
        for mut key in self.repository.find_by_subscription(subscription).await? {
            if key.is_revoked() || key.is_paused() == paused {
                continue;
            }
            key.set_paused(paused);
            self.repository.update(key).await?;
        }
        Ok(())
    }

    /// Keys of the subscription may not outlive its new ending date
    pub async fn expire_for_subscription(
        &self,
        subscription: &str,
        ending_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        for mut key in self.repository.find_by_subscription(subscription).await? {
            if !key.is_revoked() && key.expire_no_later_than(ending_at) {
                self.repository.update(key).await?;
            }
        }
        Ok(())
    }

    /// Forget the subscription's keys; shared keys only lose the subscription
    pub async fn delete_for_subscription(&self, subscription: &str) -> Result<(), DomainError> {
        for mut key in self.repository.find_by_subscription(subscription).await? {
            if key.is_shared() {
                key.remove_subscription(subscription);
                self.repository.update(key).await?;
            } else {
                self.repository.delete(key.id()).await?;
            }
        }
        Ok(())
    }

    /// Revoke whatever key of an archived application is still live
    pub async fn revoke_for_application(&self, application: &str) -> Result<usize, DomainError> {
        let mut revoked = 0;
        for mut key in self.repository.find_by_application(application).await? {
            if key.is_revoked() {
                continue;
            }
            key.revoke()?;
            self.repository.update(key).await?;
            revoked += 1;
        }
        Ok(revoked)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<ApiKey, DomainError> {
        self.repository
            .get(&ApiKeyId::new(id))
            .await?
            .ok_or_else(|| DomainError::api_key_not_found(id))
    }

    /// Keys of a subscription, newest first
    pub async fn find_by_subscription(&self, subscription: &str) -> Result<Vec<ApiKey>, DomainError> {
        let mut keys = self.repository.find_by_subscription(subscription).await?;
        keys.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(keys)
    }

    pub async fn find_by_application(&self, application: &str) -> Result<Vec<ApiKey>, DomainError> {
        let mut keys = self.repository.find_by_application(application).await?;
        keys.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(keys)
    }

    async fn find_for_subscription(
        &self,
        subscription: &Subscription,
        key_id: &str,
    ) -> Result<ApiKey, DomainError> {
        let key = self.find_by_id(key_id).await?;
        if !key.covers(subscription.id().as_str()) {
            return Err(DomainError::api_key_not_found(key_id));
        }
        Ok(key)
    }

    async fn record(
        &self,
        event: AuditEvent,
        subscription: &Subscription,
        key: &ApiKey,
        previous: Option<&ApiKey>,
        user: &str,
    ) {
        self.audit
            .create_api_audit_log(
                subscription.api(),
                user,
                event,
                BTreeMap::from([
                    (AuditProperty::ApiKey, key.id().to_string()),
                    (AuditProperty::Subscription, subscription.id().to_string()),
                    (AuditProperty::Application, key.application().to_string()),
                ]),
                changes(previous, Some(key)),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{AppSettings, ApplicationSettings};
    use crate::infrastructure::api_key::StorageApiKeyRepository;
    use crate::infrastructure::audit::StorageAuditRepository;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::subscription::StorageSubscriptionRepository;

    struct Fixture {
        service: ApiKeyService,
        subscriptions: Arc<StorageSubscriptionRepository>,
    }

    fn fixture() -> Fixture {
        let subscriptions = Arc::new(StorageSubscriptionRepository::new(Arc::new(
            InMemoryStorage::new(),
        )));
        let audit = Arc::new(AuditService::new(
            Arc::new(StorageAuditRepository::new(Arc::new(InMemoryStorage::new()))),
            "DEFAULT",
            "DEFAULT",
        ));
        Fixture {
            service: ApiKeyService::new(
                Arc::new(StorageApiKeyRepository::new(Arc::new(InMemoryStorage::new()))),
                subscriptions.clone(),
                audit,
            ),
            subscriptions,
        }
    }

    fn application(mode: ApiKeyMode) -> Application {
        Application::new(
            "DEFAULT",
            "App",
            ApplicationSettings::App(AppSettings::default()),
        )
        .with_api_key_mode(mode)
    }

    async fn accepted(fixture: &Fixture, application: &Application, plan: &str) -> Subscription {
        let mut subscription = Subscription::new("api-1", plan, application.id().as_str(), "u1");
        subscription.accept("u1", None, None, None).unwrap();
        fixture.subscriptions.create(subscription).await.unwrap()
    }

    #[tokio::test]
    async fn test_issue_exclusive_generates_per_subscription() {
        let f = fixture();
        let app = application(ApiKeyMode::Exclusive);

        let first = accepted(&f, &app, "plan-1").await;
        let second = accepted(&f, &app, "plan-2").await;

        let k1 = f.service.issue(&app, &first, "u1").await.unwrap();
        let k2 = f.service.issue(&app, &second, "u1").await.unwrap();

        assert_ne!(k1.id(), k2.id());
        assert!(k1.key().starts_with("apim_"));
        assert!(!k1.is_shared());
    }

    #[tokio::test]
    async fn test_issue_shared_reuses_key() {
        let f = fixture();
        let app = application(ApiKeyMode::Shared);

        let first = accepted(&f, &app, "plan-1").await;
        let second = accepted(&f, &app, "plan-2").await;

        let k1 = f.service.issue(&app, &first, "u1").await.unwrap();
        let k2 = f.service.issue(&app, &second, "u1").await.unwrap();

        assert_eq!(k1.id(), k2.id());
        assert!(k2.is_shared());
        assert_eq!(f.service.find_by_application(app.id().as_str()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_renew_expires_previous_keys() {
        let f = fixture();
        let app = application(ApiKeyMode::Exclusive);
        let subscription = accepted(&f, &app, "plan-1").await;

        let old = f.service.issue(&app, &subscription, "u1").await.unwrap();
        let renewed = f.service.renew(&subscription, "u1").await.unwrap();
        assert_ne!(old.key(), renewed.key());

        let old = f.service.find_by_id(old.id().as_str()).await.unwrap();
        let expire_at = old.expire_at().unwrap();
        assert!(expire_at <= Utc::now() + Duration::hours(RENEWAL_GRACE_PERIOD_HOURS));
        assert!(renewed.expire_at().is_none());
    }

    #[tokio::test]
    async fn test_revoke_twice_is_invalid() {
        let f = fixture();
        let app = application(ApiKeyMode::Exclusive);
        let subscription = accepted(&f, &app, "plan-1").await;
        let key = f.service.issue(&app, &subscription, "u1").await.unwrap();

        f.service
            .revoke(&subscription, key.id().as_str(), "u1")
            .await
            .unwrap();
        let err = f
            .service
            .revoke(&subscription, key.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_revoke_through_wrong_subscription() {
        let f = fixture();
        let app = application(ApiKeyMode::Exclusive);
        let subscription = accepted(&f, &app, "plan-1").await;
        let other = accepted(&f, &app, "plan-2").await;
        let key = f.service.issue(&app, &subscription, "u1").await.unwrap();

        let err = f
            .service
            .revoke(&other, key.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reactivate_requires_accepted_subscription() {
        let f = fixture();
        let app = application(ApiKeyMode::Exclusive);
        let subscription = accepted(&f, &app, "plan-1").await;
        let key = f.service.issue(&app, &subscription, "u1").await.unwrap();
        f.service
            .revoke(&subscription, key.id().as_str(), "u1")
            .await
            .unwrap();

        let key = f
            .service
            .reactivate(&subscription, key.id().as_str(), "u1")
            .await
            .unwrap();
        assert!(!key.is_revoked());

        f.service
            .revoke(&subscription, key.id().as_str(), "u1")
            .await
            .unwrap();
        let mut closed = subscription.clone();
        closed.close().unwrap();
        f.subscriptions.update(closed.clone()).await.unwrap();

        let err = f
            .service
            .reactivate(&closed, key.id().as_str(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_shared_key_survives_until_last_subscription_closes() {
        let f = fixture();
        let app = application(ApiKeyMode::Shared);
        let first = accepted(&f, &app, "plan-1").await;
        let second = accepted(&f, &app, "plan-2").await;
        let key = f.service.issue(&app, &first, "u1").await.unwrap();
        f.service.issue(&app, &second, "u1").await.unwrap();

        let mut first_closed = first.clone();
        first_closed.close().unwrap();
        f.subscriptions.update(first_closed.clone()).await.unwrap();
        assert_eq!(
            f.service.revoke_for_subscription(&first_closed, "u1").await.unwrap(),
            0
        );

        let mut second_closed = second.clone();
        second_closed.close().unwrap();
        f.subscriptions.update(second_closed.clone()).await.unwrap();
        assert_eq!(
            f.service.revoke_for_subscription(&second_closed, "u1").await.unwrap(),
            1
        );
        assert!(f.service.find_by_id(key.id().as_str()).await.unwrap().is_revoked());
    }

    #[tokio::test]
    async fn test_pause_and_expire_for_subscription() {
        let f = fixture();
        let app = application(ApiKeyMode::Exclusive);
        let subscription = accepted(&f, &app, "plan-1").await;
        let key = f.service.issue(&app, &subscription, "u1").await.unwrap();
        let id = subscription.id().as_str();

        f.service.set_paused_for_subscription(id, true).await.unwrap();
        assert!(!f.service.find_by_id(key.id().as_str()).await.unwrap().is_valid());

        f.service.set_paused_for_subscription(id, false).await.unwrap();
        let ending = Utc::now() + Duration::days(3);
        f.service.expire_for_subscription(id, ending).await.unwrap();
        let key = f.service.find_by_id(key.id().as_str()).await.unwrap();
        assert_eq!(key.expire_at(), Some(ending));
        assert!(key.is_valid());
    }
}
