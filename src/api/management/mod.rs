//! Management API endpoints

pub mod alerts;
pub mod apis;
pub mod applications;
pub mod audit;
pub mod groups;
pub mod jobs;
pub mod members;
pub mod plans;
pub mod roles;
pub mod subscriptions;
pub mod users;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::state::AppState;
use super::types::ApiError;

/// Create management API router
pub fn create_management_router() -> Router<AppState> {
    Router::new()
        // Current user
        .route("/user", get(users::current_user))
        .route("/user/password", post(users::change_password))
        // APIs
        .route("/apis", get(apis::list_apis).post(apis::create_api))
        .route(
            "/apis/{api}",
            get(apis::get_api)
                .put(apis::update_api)
                .delete(apis::delete_api)
                .post(apis::change_lifecycle),
        )
        .route("/apis/{api}/deploy", post(apis::deploy_api))
        .route("/apis/{api}/state", get(apis::api_state))
        .route(
            "/apis/{api}/members",
            get(members::list_api_members)
                .post(members::add_api_member)
                .delete(members::delete_api_member),
        )
        .route(
            "/apis/{api}/members/transfer_ownership",
            post(members::transfer_api_ownership),
        )
        // Plans
        .route(
            "/apis/{api}/plans",
            get(plans::list_plans).post(plans::create_plan),
        )
        .route(
            "/apis/{api}/plans/{plan}",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/apis/{api}/plans/{plan}/_publish", post(plans::publish_plan))
        .route(
            "/apis/{api}/plans/{plan}/_deprecate",
            post(plans::deprecate_plan),
        )
        .route("/apis/{api}/plans/{plan}/_close", post(plans::close_plan))
        // API subscriptions and keys
        .route(
            "/apis/{api}/subscriptions",
            get(subscriptions::list_api_subscriptions)
                .post(subscriptions::create_api_subscription),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}",
            get(subscriptions::get_api_subscription)
                .put(subscriptions::update_api_subscription),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}/_process",
            post(subscriptions::process_subscription),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}/status",
            post(subscriptions::change_subscription_status),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}/_transfer",
            post(subscriptions::transfer_subscription),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}/apikeys",
            get(subscriptions::list_api_keys),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}/apikeys/_renew",
            post(subscriptions::renew_api_key),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}/apikeys/{apikey}",
            delete(subscriptions::revoke_api_key),
        )
        .route(
            "/apis/{api}/subscriptions/{subscription}/apikeys/{apikey}/_reactivate",
            post(subscriptions::reactivate_api_key),
        )
        // API alerts and audit
        .route(
            "/apis/{api}/alerts",
            get(alerts::list_api_alerts).post(alerts::create_api_alert),
        )
        .route(
            "/apis/{api}/alerts/{alert}",
            put(alerts::update_api_alert).delete(alerts::delete_api_alert),
        )
        .route("/apis/{api}/audit", get(audit::search_api_audit))
        // Applications
        .route(
            "/applications",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/applications/{application}",
            get(applications::get_application)
                .put(applications::update_application)
                .delete(applications::archive_application),
        )
        .route(
            "/applications/{application}/renew_secret",
            post(applications::renew_client_secret),
        )
        .route(
            "/applications/{application}/members",
            get(members::list_application_members)
                .post(members::add_application_member)
                .delete(members::delete_application_member),
        )
        .route(
            "/applications/{application}/members/transfer_ownership",
            post(members::transfer_application_ownership),
        )
        .route(
            "/applications/{application}/subscriptions",
            get(subscriptions::list_application_subscriptions)
                .post(subscriptions::create_application_subscription),
        )
        .route(
            "/applications/{application}/subscriptions/{subscription}",
            get(subscriptions::get_application_subscription)
                .delete(subscriptions::close_application_subscription),
        )
        .route(
            "/applications/{application}/subscriptions/{subscription}/apikeys",
            get(subscriptions::list_application_api_keys),
        )
        .route(
            "/applications/{application}/alerts",
            get(alerts::list_application_alerts).post(alerts::create_application_alert),
        )
        .route(
            "/applications/{application}/alerts/{alert}",
            put(alerts::update_application_alert).delete(alerts::delete_application_alert),
        )
        // Groups
        .route(
            "/configuration/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route(
            "/configuration/groups/{group}",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route(
            "/configuration/groups/{group}/members",
            get(groups::list_group_members).post(groups::add_group_member),
        )
        .route(
            "/configuration/groups/{group}/members/{member}",
            delete(groups::delete_group_member),
        )
        .route(
            "/configuration/groups/{group}/memberships",
            get(groups::group_references).post(groups::associate_group),
        )
        // Roles
        .route(
            "/configuration/rolescopes/{scope}/roles",
            get(roles::list_roles).post(roles::create_role),
        )
        .route(
            "/configuration/rolescopes/{scope}/roles/{role}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        // Users
        .route(
            "/organization/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/organization/users/{user}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/organization/users/{user}/memberships",
            get(users::user_memberships),
        )
        .route(
            "/organization/users/{user}/roles",
            put(users::update_user_roles),
        )
        // Platform alerts
        .route(
            "/platform/alerts",
            get(alerts::list_platform_alerts).post(alerts::create_platform_alert),
        )
        .route(
            "/platform/alerts/{alert}",
            put(alerts::update_platform_alert).delete(alerts::delete_platform_alert),
        )
        .route("/alerts/status", get(alerts::alert_status))
        // Audit
        .route("/audit", get(audit::search_audit))
        .route("/audit/events", get(audit::audit_events))
        // Async jobs
        .route("/async-jobs", get(jobs::list_jobs))
        .route("/async-jobs/{job}", get(jobs::get_job))
}

/// Parse a comma separated query value; an absent or blank value gives an empty list
pub(crate) fn parse_list<T>(
    value: Option<&str>,
    param: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, ApiError> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            parse(item).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown value '{}' for '{}'", item, param))
                    .with_param(param)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests;

#[cfg(test)]
mod parse_tests {
    use super::*;
    use crate::domain::plan::PlanStatus;

    #[test]
    fn test_parse_list() {
        assert!(parse_list(None, "status", PlanStatus::parse).unwrap().is_empty());
        assert_eq!(
            parse_list(Some("published, staging"), "status", PlanStatus::parse).unwrap(),
            vec![PlanStatus::Published, PlanStatus::Staging]
        );

        let err = parse_list(Some("PUBLISHED,NOPE"), "status", PlanStatus::parse).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
