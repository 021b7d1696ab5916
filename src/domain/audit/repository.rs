//! Audit repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{Audit, AuditQuery};
use crate::domain::DomainError;

/// Append-only audit store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync + std::fmt::Debug {
    async fn create(&self, audit: Audit) -> Result<Audit, DomainError>;

    /// Audits matching the query, newest first
    async fn search(&self, query: &AuditQuery) -> Result<Vec<Audit>, DomainError>;
}
