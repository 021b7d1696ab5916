//! Async job infrastructure

mod service;
mod storage_repository;

pub use service::{AsyncJobService, DEFAULT_JOB_TIME_TO_LIVE_MINUTES};
pub use storage_repository::StorageAsyncJobRepository;
