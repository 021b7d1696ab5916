//! Audit infrastructure

mod service;
mod storage_repository;

pub use service::{AuditProperties, AuditService};
pub use storage_repository::StorageAuditRepository;
