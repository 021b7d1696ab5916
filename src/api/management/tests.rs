use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::api::router::{create_router, RouterOptions};
use crate::api::state::AppState;
use crate::infrastructure::auth::{JwtConfig, JwtService};
use crate::infrastructure::services::{ServiceSettings, Services};

const ADMIN_PASSWORD: &str = "admin-password-1";

struct Harness {
    app: Router,
    token: String,
}

impl Harness {
    async fn new() -> Self {
        let services = Services::in_memory(&ServiceSettings::default()).await.unwrap();
        services
            .users
            .initialize_admin("admin", ADMIN_PASSWORD, None)
            .await
            .unwrap();

        let jwt = JwtService::new(JwtConfig::new("test-secret", 1));
        let app = create_router(AppState::new(services, jwt), &RouterOptions::default());

        let (status, body, _) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"username": "admin", "password": ADMIN_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        Self { app, token }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value, Option<String>) {
        send(&self.app, method, uri, Some(&self.token), body).await
    }

    async fn create_api(&self, name: &str, context_path: &str) -> String {
        let (status, body, _) = self
            .call(
                Method::POST,
                "/management/apis",
                Some(json!({"name": name, "version": "1.0", "context_path": context_path})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, body, location)
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let h = Harness::new().await;

    let (status, body, _) = send(
        &h.app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"username": "admin", "password": "wrong-password"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "authentication_error");
}

#[tokio::test]
async fn test_invalid_token_is_rejected_even_on_public_listing() {
    let h = Harness::new().await;

    let (status, _, _) = send(&h.app, Method::GET, "/management/apis", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&h.app, Method::GET, "/management/apis", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_current_user_lists_permissions() {
    let h = Harness::new().await;

    let (status, body, _) = h.call(Method::GET, "/management/user", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "admin");
    assert!(body["permissions"].is_object());
}

#[tokio::test]
async fn test_api_create_get_delete() {
    let h = Harness::new().await;

    let (status, body, location) = h
        .call(
            Method::POST,
            "/management/apis",
            Some(json!({"name": "Echo", "version": "1.0", "context_path": "/echo"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap();
    assert_eq!(location.as_deref(), Some(format!("/management/apis/{}", id).as_str()));
    assert_eq!(body["lifecycle_state"], "STOPPED");

    let (status, body, _) = h.call(Method::GET, &format!("/management/apis/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Echo");

    let (status, body, _) = h
        .call(Method::DELETE, &format!("/management/apis/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body, _) = h.call(Method::GET, &format!("/management/apis/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found_error");
}

#[tokio::test]
async fn test_duplicate_context_path_conflicts() {
    let h = Harness::new().await;
    h.create_api("Echo", "/echo").await;

    let (status, body, _) = h
        .call(
            Method::POST,
            "/management/apis",
            Some(json!({"name": "Other", "version": "1.0", "context_path": "/echo"})),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "conflict_error");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let h = Harness::new().await;

    let (status, body, _) = h
        .call(Method::POST, "/management/apis", Some(json!({"name": 42})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_lifecycle_action_must_be_known() {
    let h = Harness::new().await;
    let id = h.create_api("Echo", "/echo").await;

    let (status, _, _) = h
        .call(Method::POST, &format!("/management/apis/{}?action=PAUSE", id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = h
        .call(Method::POST, &format!("/management/apis/{}?action=START", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifecycle_state"], "STARTED");
}

#[tokio::test]
async fn test_paged_listing_shape() {
    let h = Harness::new().await;
    for i in 0..3 {
        h.create_api(&format!("Api {}", i), &format!("/api-{}", i)).await;
    }

    let (status, body, _) = h.call(Method::GET, "/management/apis?page=1&size=2", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["page"]["current"], 1);
    assert_eq!(body["page"]["per_page"], 2);
    assert_eq!(body["page"]["total_elements"], 3);
    assert_eq!(body["page"]["total_pages"], 2);
}

#[tokio::test]
async fn test_huge_page_number_returns_empty_page() {
    let h = Harness::new().await;
    h.create_api("Echo", "/echo").await;

    let uri = format!("/management/apis?page={}&size=100", usize::MAX);
    let (status, body, _) = h.call(Method::GET, &uri, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["page"]["total_elements"], 1);
}

#[tokio::test]
async fn test_plan_publish_and_listing_by_status() {
    let h = Harness::new().await;
    let api = h.create_api("Echo", "/echo").await;

    let (status, plan, location) = h
        .call(
            Method::POST,
            &format!("/management/apis/{}/plans", api),
            Some(json!({"name": "Gold", "security": "API_KEY"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(plan["status"], "STAGING");
    let plan_id = plan["id"].as_str().unwrap();
    assert_eq!(
        location.as_deref(),
        Some(format!("/management/apis/{}/plans/{}", api, plan_id).as_str())
    );

    let (status, published, _) = h
        .call(
            Method::POST,
            &format!("/management/apis/{}/plans/{}/_publish", api, plan_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "PUBLISHED");

    let (status, plans, _) = h
        .call(
            Method::GET,
            &format!("/management/apis/{}/plans?status=PUBLISHED", api),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plans.as_array().unwrap().len(), 1);

    let (status, _, _) = h
        .call(Method::GET, &format!("/management/apis/{}/plans?status=BOGUS", api), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_plan_of_unknown_api_is_not_found() {
    let h = Harness::new().await;

    let (status, _, _) = h
        .call(Method::GET, "/management/apis/missing/plans/missing", None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_association_is_accepted_as_job() {
    let h = Harness::new().await;
    h.create_api("Echo", "/echo").await;

    let (status, group, location) = h
        .call(
            Method::POST,
            "/management/configuration/groups",
            Some(json!({"name": "Partners"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(location.is_some());
    let group_id = group["id"].as_str().unwrap();

    let (status, job, _) = h
        .call(
            Method::POST,
            &format!("/management/configuration/groups/{}/memberships?type=api", group_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(job["type"], "GROUP_ASSOCIATION");
    assert_eq!(job["source_id"], group_id);

    let (status, fetched, _) = h
        .call(
            Method::GET,
            &format!("/management/async-jobs/{}", job["id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], job["id"]);

    let (status, _, _) = h
        .call(
            Method::POST,
            &format!("/management/configuration/groups/{}/memberships?type=user", group_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_without_role_is_forbidden() {
    let h = Harness::new().await;

    let (status, _, _) = h
        .call(
            Method::POST,
            "/management/organization/users",
            Some(json!({"username": "jdoe", "password": "jdoe-password-1", "email": "jdoe@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = send(
        &h.app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"username": "jdoe", "password": "jdoe-password-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, body, _) = send(
        &h.app,
        Method::POST,
        "/management/configuration/rolescopes/API/roles",
        Some(token),
        Some(json!({"name": "READER", "permissions": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "permission_error");
}

#[tokio::test]
async fn test_unknown_role_scope_is_not_found() {
    let h = Harness::new().await;

    let (status, _, _) = h
        .call(Method::GET, "/management/configuration/rolescopes/PLANET/roles", None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
