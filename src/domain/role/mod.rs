//! Role domain module
//!
//! Roles group permissions inside one scope. Users receive roles through
//! memberships on an organization, environment, API, application or group.

mod entity;
mod permission;
mod repository;

pub use entity::{Role, RoleKey, ADMIN, OWNER, PRIMARY_OWNER, USER};
pub use permission::{Action, Actions, RolePermission, RoleScope};
pub use repository::RoleRepository;

#[cfg(test)]
pub use repository::MockRoleRepository;
