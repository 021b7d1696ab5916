//! Async job domain

mod entity;
mod repository;

pub use entity::{AsyncJob, AsyncJobCriteria, AsyncJobId, AsyncJobStatus, AsyncJobType};
pub use repository::AsyncJobRepository;

#[cfg(test)]
pub use repository::MockAsyncJobRepository;
