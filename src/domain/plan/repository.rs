//! Plan repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Plan, PlanId};
use crate::domain::DomainError;

/// Repository for plans
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlanRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &PlanId) -> Result<Option<Plan>, DomainError>;

    async fn create(&self, plan: Plan) -> Result<Plan, DomainError>;

    async fn update(&self, plan: Plan) -> Result<Plan, DomainError>;

    async fn delete(&self, id: &PlanId) -> Result<bool, DomainError>;

    /// Plans of an API, sorted by order then name
    async fn find_by_api(&self, api: &str) -> Result<Vec<Plan>, DomainError>;
}
