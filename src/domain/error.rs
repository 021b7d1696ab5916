use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} [{id}] can not be found.")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid ID format: {message}")]
    InvalidId { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    // Named management errors

    pub fn api_not_found(api: impl Into<String>) -> Self {
        Self::not_found("Api", api)
    }

    pub fn plan_not_found(plan: impl Into<String>) -> Self {
        Self::not_found("Plan", plan)
    }

    pub fn subscription_not_found(subscription: impl Into<String>) -> Self {
        Self::not_found("Subscription", subscription)
    }

    pub fn application_not_found(application: impl Into<String>) -> Self {
        Self::not_found("Application", application)
    }

    pub fn api_key_not_found(key: impl Into<String>) -> Self {
        Self::not_found("API key", key)
    }

    pub fn user_not_found(user: impl Into<String>) -> Self {
        Self::not_found("User", user)
    }

    pub fn group_not_found(group: impl Into<String>) -> Self {
        Self::not_found("Group", group)
    }

    pub fn role_not_found(role: impl Into<String>) -> Self {
        Self::not_found("Role", role)
    }

    pub fn membership_not_found(member: impl Into<String>) -> Self {
        Self::not_found("Membership", member)
    }

    pub fn alert_not_found(alert: impl Into<String>) -> Self {
        Self::not_found("Alert", alert)
    }

    pub fn async_job_not_found(job: impl Into<String>) -> Self {
        Self::not_found("Async job", job)
    }

    pub fn plan_already_closed(plan: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!("Plan {} is already closed", plan))
    }

    pub fn plan_already_deprecated(plan: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!("Plan {} is already deprecated", plan))
    }

    pub fn plan_not_yet_published(plan: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!("Plan {} is not published", plan))
    }

    pub fn plan_not_subscribable(plan: impl std::fmt::Display) -> Self {
        Self::validation(format!("Plan {} is not subscribable", plan))
    }

    pub fn plan_already_subscribed(plan: impl std::fmt::Display) -> Self {
        Self::conflict(format!(
            "An active subscription already exists for plan {}",
            plan
        ))
    }

    pub fn plan_with_subscriptions(plan: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!(
            "Plan {} has subscriptions and can not be deleted",
            plan
        ))
    }

    pub fn subscription_already_processed(subscription: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!(
            "Subscription {} has already been processed",
            subscription
        ))
    }

    pub fn subscription_not_updatable(subscription: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!(
            "Subscription {} can not be updated",
            subscription
        ))
    }

    pub fn subscription_not_closable(subscription: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!(
            "Subscription {} can not be closed",
            subscription
        ))
    }

    pub fn subscription_not_paused(subscription: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!("Subscription {} is not paused", subscription))
    }

    pub fn api_running_state(api: impl std::fmt::Display) -> Self {
        Self::invalid_state(format!(
            "Api {} is still running, it must be stopped first",
            api
        ))
    }

    pub fn api_not_deletable(plans: &[String]) -> Self {
        Self::invalid_state(format!(
            "Plan(s) [{}] must be closed before being able to delete the API !",
            plans.join(", ")
        ))
    }

    pub fn api_context_path_already_exists(context_path: impl std::fmt::Display) -> Self {
        Self::conflict(format!(
            "The path [{}] is already covered by an other API.",
            context_path
        ))
    }

    pub fn client_id_already_exists(client_id: impl std::fmt::Display) -> Self {
        Self::conflict(format!(
            "An application already exists with client_id [{}]",
            client_id
        ))
    }

    pub fn group_name_already_exists(name: impl std::fmt::Display) -> Self {
        Self::conflict(format!("A group named [{}] already exists", name))
    }

    pub fn forbidden_access() -> Self {
        Self::forbidden("You do not have sufficient rights to access this resource")
    }

    pub fn unauthorized_access() -> Self {
        Self::unauthorized("You must be authenticated to access this resource")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::api_not_found("my-api");
        assert_eq!(error.to_string(), "Api [my-api] can not be found.");
    }

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Invalid input");
        assert_eq!(error.to_string(), "Validation error: Invalid input");
    }

    #[test]
    fn test_conflict_error() {
        let error = DomainError::group_name_already_exists("devs");
        assert_eq!(
            error.to_string(),
            "Conflict: A group named [devs] already exists"
        );
    }

    #[test]
    fn test_api_not_deletable_lists_plans() {
        let error = DomainError::api_not_deletable(&["gold".to_string(), "silver".to_string()]);
        assert!(error
            .to_string()
            .contains("Plan(s) [gold, silver] must be closed"));
    }

    #[test]
    fn test_forbidden_access() {
        assert!(matches!(
            DomainError::forbidden_access(),
            DomainError::Forbidden { .. }
        ));
        assert!(matches!(
            DomainError::unauthorized_access(),
            DomainError::Unauthorized { .. }
        ));
    }
}
