//! Api domain

mod context_path;
mod entity;
mod repository;

pub use context_path::{context_paths_overlap, normalize_context_path};
pub use entity::{Api, ApiCriteria, ApiId, ApiLifecycleState, LifecycleState, Visibility};
pub use repository::ApiRepository;

#[cfg(test)]
pub use repository::MockApiRepository;
