//! Group domain

mod entity;
mod repository;

pub use entity::{Group, GroupEventRule, GroupId};
pub use repository::GroupRepository;

#[cfg(test)]
pub use repository::MockGroupRepository;
