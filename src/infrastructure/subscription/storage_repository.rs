//! Storage-backed subscription repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::storage::Storage;
use crate::domain::subscription::{
    Subscription, SubscriptionCriteria, SubscriptionId, SubscriptionRepository,
};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageSubscriptionRepository {
    storage: Arc<dyn Storage<Subscription>>,
}

impl StorageSubscriptionRepository {
    pub fn new(storage: Arc<dyn Storage<Subscription>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SubscriptionRepository for StorageSubscriptionRepository {
    async fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, subscription: Subscription) -> Result<Subscription, DomainError> {
        self.storage.create(subscription).await
    }

    async fn update(&self, subscription: Subscription) -> Result<Subscription, DomainError> {
        if !self.storage.exists(subscription.id()).await? {
            return Err(DomainError::subscription_not_found(subscription.id().as_str()));
        }
        self.storage.update(subscription).await
    }

    async fn delete(&self, id: &SubscriptionId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn search(
        &self,
        criteria: &SubscriptionCriteria,
    ) -> Result<Vec<Subscription>, DomainError> {
        // Narrow with the most selective indexed field first
        let candidates = match (&criteria.plan, &criteria.application, &criteria.api) {
            (Some(plan), _, _) => self.storage.find_by("plan", plan).await?,
            (None, Some(application), _) => {
                self.storage.find_by("application", application).await?
            }
            (None, None, Some(api)) => self.storage.find_by("api", api).await?,
            (None, None, None) => self.storage.list().await?,
        };

        let mut subscriptions: Vec<Subscription> = candidates
            .into_iter()
            .filter(|s| criteria.matches(s))
            .collect();
        subscriptions.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(subscriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::SubscriptionStatus;
    use crate::infrastructure::storage::InMemoryStorage;

    #[tokio::test]
    async fn test_search() {
        let repo = StorageSubscriptionRepository::new(Arc::new(InMemoryStorage::new()));

        let mut accepted = Subscription::new("api-1", "plan-1", "app-1", "u");
        accepted.accept("admin", None, None, None).unwrap();
        repo.create(accepted).await.unwrap();
        repo.create(Subscription::new("api-1", "plan-2", "app-1", "u"))
            .await
            .unwrap();
        repo.create(Subscription::new("api-2", "plan-3", "app-2", "u"))
            .await
            .unwrap();

        let by_api = repo.search(&SubscriptionCriteria::for_api("api-1")).await.unwrap();
        assert_eq!(by_api.len(), 2);

        let accepted = repo
            .search(
                &SubscriptionCriteria::for_application("app-1")
                    .with_statuses(vec![SubscriptionStatus::Accepted]),
            )
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].plan(), "plan-1");

        let all = repo.search(&SubscriptionCriteria::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
