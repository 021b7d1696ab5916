//! Role infrastructure

mod service;
mod storage_repository;

pub use service::{CreateRoleRequest, RoleService, UpdateRoleRequest};
pub use storage_repository::StorageRoleRepository;
