//! Subscription domain

mod entity;
mod repository;

pub use entity::{Subscription, SubscriptionCriteria, SubscriptionId, SubscriptionStatus};
pub use repository::SubscriptionRepository;

#[cfg(test)]
pub use repository::MockSubscriptionRepository;
