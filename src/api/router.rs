use axum::{http::HeaderValue, middleware as axum_middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::auth;
use super::health;
use super::management;
use super::middleware::{logging_middleware, metrics_middleware};
use super::state::AppState;

/// Cross-cutting router settings taken from configuration
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Empty allows any origin
    pub cors_origins: Vec<String>,
}

/// Create the full router with application state
pub fn create_router(state: AppState, options: &RouterOptions) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::ready_check))
        .route("/health/live", get(health::live_check))
        // Authentication endpoints (no auth required for login)
        .nest("/auth", auth::create_auth_router())
        // Management API
        .nest("/management", management::create_management_router())
        .with_state(state)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(cors_layer(&options.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::infrastructure::auth::{JwtConfig, JwtService};
    use crate::infrastructure::services::{ServiceSettings, Services};

    async fn router() -> Router {
        let services = Services::in_memory(&ServiceSettings::default()).await.unwrap();
        let jwt = JwtService::new(JwtConfig::new("test-secret", 1));
        create_router(AppState::new(services, jwt), &RouterOptions::default())
    }

    #[tokio::test]
    async fn test_health_route_sets_request_id() {
        let response = router()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_management_requires_token() {
        let response = router()
            .await
            .oneshot(
                Request::get("/management/organization/users")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = router()
            .await
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
