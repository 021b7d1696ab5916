//! Membership infrastructure

mod service;
mod storage_repository;

pub use service::{Member, MembershipService};
pub use storage_repository::StorageMembershipRepository;
