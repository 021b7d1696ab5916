//! Audit domain

mod entity;
mod patch;
mod repository;

pub use entity::{
    Audit, AuditEvent, AuditId, AuditProperty, AuditQuery, AuditReferenceType,
};
pub use patch::{changes, diff, PatchOp, PatchOperation};
pub use repository::AuditRepository;

#[cfg(test)]
pub use repository::MockAuditRepository;
