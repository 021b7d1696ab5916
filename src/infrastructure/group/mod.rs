//! Group infrastructure

mod service;
mod storage_repository;

pub use service::{GroupAssociation, GroupRequest, GroupService};
pub use storage_repository::StorageGroupRepository;
