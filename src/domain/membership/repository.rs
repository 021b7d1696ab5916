//! Membership repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Membership, MembershipId, MembershipReferenceType};
use crate::domain::role::RoleKey;
use crate::domain::DomainError;

/// Repository for memberships
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &MembershipId) -> Result<Option<Membership>, DomainError>;

    async fn create(&self, membership: Membership) -> Result<Membership, DomainError>;

    async fn update(&self, membership: Membership) -> Result<Membership, DomainError>;

    async fn delete(&self, id: &MembershipId) -> Result<bool, DomainError>;

    /// Memberships held by a member, optionally restricted to one reference type
    async fn find_by_member(
        &self,
        member_id: &str,
        reference_type: Option<MembershipReferenceType>,
    ) -> Result<Vec<Membership>, DomainError>;

    /// Memberships attached to one reference
    async fn find_by_reference(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
    ) -> Result<Vec<Membership>, DomainError>;

    /// Memberships granting a role
    async fn find_by_role(&self, role: &RoleKey) -> Result<Vec<Membership>, DomainError>;
}
