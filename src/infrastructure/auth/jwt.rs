//! Management session tokens
//!
//! Tokens are HS256 JWTs scoped to the organization of the user they were issued
//! for. The issuer is checked on every validation.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::User;
use crate::domain::DomainError;

pub const DEFAULT_ISSUER: &str = "apim-management";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id
    pub sub: String,
    pub username: String,
    /// Organization the session belongs to
    pub org: String,
    pub iss: String,
    /// Token id, unique per login
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    fn issue(user: &User, issuer: &str, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user.id().as_str().to_string(),
            username: user.username().to_string(),
            org: user.organization_id().to_string(),
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn organization_id(&self) -> &str {
        &self.org
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: u64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expiration_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    fn ttl(&self) -> Duration {
        Duration::hours(i64::try_from(self.expiration_hours).unwrap_or(i64::MAX / 3600))
    }
}

/// A signed token and the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: JwtClaims,
}

#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("expiration_hours", &self.config.expiration_hours)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Sign a session token for `user`
    pub fn generate(&self, user: &User) -> Result<IssuedToken, DomainError> {
        let claims = JwtClaims::issue(user, &self.config.issuer, self.config.ttl());

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken { token, claims })
    }

    /// Claims of a token signed with our key, issued by us and not yet expired
    pub fn validate(&self, token: &str) -> Result<JwtClaims, DomainError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| DomainError::unauthorized(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> JwtService {
        JwtService::new(JwtConfig::new(secret, 8))
    }

    #[test]
    fn test_issued_token_carries_user_and_organization() {
        let service = service("secret");
        let user = User::new("ORG-1", "jdoe");

        let issued = service.generate(&user).unwrap();
        let claims = service.validate(&issued.token).unwrap();

        assert_eq!(claims.user_id(), user.id().as_str());
        assert_eq!(claims.organization_id(), "ORG-1");
        assert_eq!(claims.username, "jdoe");
        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
        assert!(claims.expires_at().is_some());
    }

    #[test]
    fn test_each_login_gets_a_distinct_token_id() {
        let service = service("secret");
        let user = User::new("DEFAULT", "jdoe");

        let first = service.generate(&user).unwrap();
        let second = service.generate(&user).unwrap();
        assert_ne!(first.claims.jti, second.claims.jti);
    }

    #[test]
    fn test_rejects_garbage_and_foreign_signatures() {
        let err = service("secret").validate("not-a-jwt").unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized { .. }));

        let issued = service("other").generate(&User::new("DEFAULT", "jdoe")).unwrap();
        assert!(service("secret").validate(&issued.token).is_err());
    }

    #[test]
    fn test_rejects_other_issuer() {
        let foreign = JwtService::new(JwtConfig::new("secret", 8).with_issuer("someone-else"));
        let issued = foreign.generate(&User::new("DEFAULT", "jdoe")).unwrap();

        assert!(service("secret").validate(&issued.token).is_err());
    }

    #[test]
    fn test_rejects_expired_token() {
        let user = User::new("DEFAULT", "jdoe");
        let mut claims = JwtClaims::issue(&user, DEFAULT_ISSUER, Duration::hours(1));
        claims.exp = (Utc::now() - Duration::minutes(5)).timestamp();

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(service("secret").validate(&token).is_err());
    }
}
