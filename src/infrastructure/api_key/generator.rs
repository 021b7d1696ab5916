//! API key and client secret generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const DEFAULT_KEY_PREFIX: &str = "apim_";

/// A freshly generated key and the hash kept next to it
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub key: String,
    pub hash: String,
}

/// Generator for random API keys and OAuth client secrets
#[derive(Debug, Clone)]
pub struct ApiKeyGenerator {
    prefix: String,
    key_bytes: usize,
}

impl ApiKeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            key_bytes: 32,
        }
    }

    pub fn with_key_bytes(mut self, bytes: usize) -> Self {
        self.key_bytes = bytes;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate a prefixed API key
    pub fn generate(&self) -> GeneratedApiKey {
        let key = format!("{}{}", self.prefix, self.random_token());
        let hash = hash_key(&key);
        GeneratedApiKey { key, hash }
    }

    /// Generate an unprefixed secret, used for OAuth client secrets
    pub fn generate_secret(&self) -> String {
        self.random_token()
    }

    fn random_token(&self) -> String {
        let mut random_bytes = vec![0u8; self.key_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        URL_SAFE_NO_PAD.encode(&random_bytes)
    }

    /// Verify a key against a stored hash
    pub fn verify_key(&self, key: &str, stored_hash: &str) -> bool {
        constant_time_compare(&hash_key(key), stored_hash)
    }
}

impl Default for ApiKeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

/// Hash an API key for storage
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("sha256${}", hex::encode(digest))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
