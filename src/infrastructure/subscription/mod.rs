//! Subscription infrastructure

mod service;
mod storage_repository;

pub use service::{NewSubscription, ProcessSubscription, SubscriptionService, SYSTEM_USER};
pub use storage_repository::StorageSubscriptionRepository;
