//! Plan domain

mod entity;
mod repository;

pub use entity::{Plan, PlanId, PlanSecurity, PlanStatus, PlanType, PlanValidation};
pub use repository::PlanRepository;

#[cfg(test)]
pub use repository::MockPlanRepository;
