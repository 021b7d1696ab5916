//! Application infrastructure

mod service;
mod storage_repository;

pub use service::{
    ApplicationQuery, ApplicationService, NewApplication, OAuthClientRequest, UpdateApplication,
};
pub use storage_repository::StorageApplicationRepository;
