//! API key domain
//!
//! Keys issued to applications when their subscriptions are accepted.

mod entity;
mod repository;

pub use entity::{ApiKey, ApiKeyId};
pub use repository::ApiKeyRepository;

#[cfg(test)]
pub use repository::MockApiKeyRepository;
