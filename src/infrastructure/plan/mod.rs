//! Plan infrastructure

mod service;
mod storage_repository;

pub use service::{CreatePlanRequest, PlanService, UpdatePlanRequest};
pub use storage_repository::StoragePlanRepository;
