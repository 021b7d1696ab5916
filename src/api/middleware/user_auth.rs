//! Bearer token authentication for management users

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::user::User;
use crate::domain::DomainError;

/// Extractor that requires a valid `Authorization: Bearer <jwt>` header
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl RequireUser {
    pub fn id(&self) -> &str {
        self.0.id().as_str()
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?
            .ok_or_else(|| ApiError::from(DomainError::unauthorized_access()))?;

        authenticate(&token, state).await.map(RequireUser)
    }
}

/// The caller when a bearer token is present; anonymous otherwise.
///
/// A token that is present but invalid is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<&str> {
        self.0.as_ref().map(|user| user.id().as_str())
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match extract_bearer_token(&parts.headers)? {
            Some(token) => authenticate(&token, state).await.map(|user| MaybeUser(Some(user))),
            None => Ok(MaybeUser(None)),
        }
    }
}

async fn authenticate(token: &str, state: &AppState) -> Result<User, ApiError> {
    debug!("Validating JWT token");

    let claims = state.jwt.validate(token)?;

    let user = state
        .services
        .users
        .find_by_id(claims.user_id())
        .await
        .map_err(|err| match err {
            DomainError::NotFound { .. } => ApiError::unauthorized("User not found"),
            other => ApiError::from(other),
        })?;

    if !user.is_active() {
        return Err(ApiError::unauthorized("User account is not active"));
    }

    if user.organization_id() != claims.organization_id() {
        return Err(ApiError::unauthorized("Token was issued for another organization"));
    }

    Ok(user)
}

/// Bearer token from the Authorization header, if one is given
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))?;

    match value.strip_prefix("Bearer ") {
        Some(token) => Ok(Some(token.trim().to_string())),
        None => Err(ApiError::unauthorized(
            "Provide a JWT via 'Authorization: Bearer <token>'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            "Bearer   eyJhbGciOiJIUzI1NiJ9.test  ".parse().unwrap(),
        );

        assert_eq!(
            extract_bearer_token(&headers).unwrap().as_deref(),
            Some("eyJhbGciOiJIUzI1NiJ9.test")
        );
    }

    #[test]
    fn test_missing_token() {
        assert!(extract_bearer_token(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn test_other_scheme_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

        let err = extract_bearer_token(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
