//! Storage-backed membership repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::membership::{
    Membership, MembershipId, MembershipReferenceType, MembershipRepository,
};
use crate::domain::role::RoleKey;
use crate::domain::storage::Storage;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct StorageMembershipRepository {
    storage: Arc<dyn Storage<Membership>>,
}

impl StorageMembershipRepository {
    pub fn new(storage: Arc<dyn Storage<Membership>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl MembershipRepository for StorageMembershipRepository {
    async fn get(&self, id: &MembershipId) -> Result<Option<Membership>, DomainError> {
        self.storage.get(id).await
    }

    async fn create(&self, membership: Membership) -> Result<Membership, DomainError> {
        self.storage.create(membership).await
    }

    async fn update(&self, membership: Membership) -> Result<Membership, DomainError> {
        self.storage.update(membership).await
    }

    async fn delete(&self, id: &MembershipId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn find_by_member(
        &self,
        member_id: &str,
        reference_type: Option<MembershipReferenceType>,
    ) -> Result<Vec<Membership>, DomainError> {
        let memberships = self.storage.find_by("member_id", member_id).await?;
        Ok(memberships
            .into_iter()
            .filter(|m| reference_type.is_none_or(|t| m.reference_type() == t))
            .collect())
    }

    async fn find_by_reference(
        &self,
        reference_type: MembershipReferenceType,
        reference_id: &str,
    ) -> Result<Vec<Membership>, DomainError> {
        let memberships = self.storage.find_by("reference_id", reference_id).await?;
        Ok(memberships
            .into_iter()
            .filter(|m| m.reference_type() == reference_type)
            .collect())
    }

    async fn find_by_role(&self, role: &RoleKey) -> Result<Vec<Membership>, DomainError> {
        self.storage.find_by("role", role.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::role::RoleScope;
    use crate::infrastructure::storage::InMemoryStorage;

    #[tokio::test]
    async fn test_queries() {
        let repo = StorageMembershipRepository::new(Arc::new(InMemoryStorage::new()));
        let owner = RoleKey::primary_owner(RoleScope::Api);
        let user = RoleKey::of(RoleScope::Application, "USER");

        repo.create(Membership::new("u1", MembershipReferenceType::Api, "a1", owner.clone()))
            .await
            .unwrap();
        repo.create(Membership::new("u1", MembershipReferenceType::Application, "a1", user))
            .await
            .unwrap();
        repo.create(Membership::new("u2", MembershipReferenceType::Api, "a2", owner.clone()))
            .await
            .unwrap();

        assert_eq!(repo.find_by_member("u1", None).await.unwrap().len(), 2);
        assert_eq!(
            repo.find_by_member("u1", Some(MembershipReferenceType::Api))
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            repo.find_by_reference(MembershipReferenceType::Api, "a1")
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(repo.find_by_role(&owner).await.unwrap().len(), 2);
    }
}
