//! API key infrastructure
//!
//! Key generation, the storage-backed repository and the key lifecycle service.

mod generator;
mod service;
mod storage_repository;

pub use generator::{hash_key, ApiKeyGenerator, GeneratedApiKey, DEFAULT_KEY_PREFIX};
pub use service::{ApiKeyService, RENEWAL_GRACE_PERIOD_HOURS};
pub use storage_repository::StorageApiKeyRepository;
