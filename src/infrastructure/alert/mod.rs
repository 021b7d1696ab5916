//! Alert infrastructure

mod service;
mod storage_repository;

pub use service::{AlertService, AlertStatus, CreateAlertRequest, UpdateAlertRequest};
pub use storage_repository::StorageAlertTriggerRepository;
