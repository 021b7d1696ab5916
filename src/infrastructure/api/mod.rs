//! API infrastructure

mod service;
mod storage_repository;

pub use service::{ApiQuery, ApiService, ApiState, NewApi, UpdateApi};
pub use storage_repository::StorageApiRepository;
