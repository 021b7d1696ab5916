//! Membership domain module

mod entity;
mod repository;

pub use entity::{Membership, MembershipId, MembershipReferenceType};
pub use repository::MembershipRepository;

#[cfg(test)]
pub use repository::MockMembershipRepository;
