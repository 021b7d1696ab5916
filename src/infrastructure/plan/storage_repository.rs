//! Storage-backed plan repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::plan::{Plan, PlanId, PlanRepository};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StoragePlanRepository {
    storage: Arc<dyn Storage<Plan>>,
}

impl StoragePlanRepository {
    pub fn new(storage: Arc<dyn Storage<Plan>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PlanRepository for StoragePlanRepository {
    async fn get(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, plan: Plan) -> Result<Plan, DomainError> {
        self.storage.create(plan).await
    }

    async fn update(&self, plan: Plan) -> Result<Plan, DomainError> {
        if !self.storage.exists(plan.id()).await? {
            return Err(DomainError::plan_not_found(plan.id().as_str()));
        }
        self.storage.update(plan).await
    }

    async fn delete(&self, id: &PlanId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn find_by_api(&self, api: &str) -> Result<Vec<Plan>, DomainError> {
        let mut plans = self.storage.find_by("api", api).await?;
        plans.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.name().cmp(b.name())));
        Ok(plans)
    }
}
