//! Domain layer - Management entities, repository traits and errors

pub mod alert;
pub mod api;
pub mod api_key;
pub mod application;
pub mod async_job;
pub mod audit;
pub mod error;
pub mod group;
pub mod membership;
pub mod pagination;
pub mod plan;
pub mod role;
pub mod storage;
pub mod subscription;
pub mod user;

pub use error::DomainError;
pub use pagination::{Page, Pageable};
pub use storage::{Storage, StorageEntity, StorageKey};
