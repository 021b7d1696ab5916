//! APIM management API
//!
//! REST management plane for an API gateway:
//! - APIs, plans, subscriptions and API keys
//! - Applications and their OAuth clients
//! - Users, roles, memberships and groups
//! - Alert triggers, audit trail and async jobs

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use api::state::AppState;
use infrastructure::auth::{JwtConfig, JwtService};
use infrastructure::services::{Repositories, Services};
use infrastructure::storage::StorageFactory;

/// How often late async jobs are timed out
const JOB_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// Build the application state from configuration
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage = config.storage.storage_config()?;
    info!(backend = ?storage.storage_type(), "Connecting storage");

    let factory = StorageFactory::connect(&storage).await?;
    let repositories = Repositories::from_factory(&factory).await?;
    let services = Services::new(&repositories, &config.service_settings());

    let jwt = create_jwt_service(config);

    Ok(AppState::new(services, jwt))
}

/// Seed the system roles and the first administrator, and start the job sweeper
pub async fn bootstrap(state: &AppState, config: &AppConfig) -> anyhow::Result<()> {
    let created = state.services.roles.initialize().await?;
    if created > 0 {
        info!(roles = created, "System roles initialized");
    }

    create_initial_admin_user(state, config).await?;
    spawn_job_sweeper(state.services.clone());

    Ok(())
}

fn create_jwt_service(config: &AppConfig) -> JwtService {
    let secret = if config.auth.jwt_secret.is_empty() {
        warn!("No JWT secret configured. Generating a random one; sessions will not survive restarts.");
        generate_random_string(64)
    } else {
        if config.auth.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("Using the default JWT secret. Set APIM__AUTH__JWT_SECRET in production.");
        }
        config.auth.jwt_secret.clone()
    };

    JwtService::new(JwtConfig::new(secret, config.auth.jwt_expiration_hours))
}

fn generate_random_string(length: usize) -> String {
    use rand::distributions::Alphanumeric;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Create an initial admin user if no users exist
async fn create_initial_admin_user(state: &AppState, config: &AppConfig) -> anyhow::Result<()> {
    let auth = &config.auth;
    let (password, generated) = match &auth.admin_password {
        Some(password) if !password.is_empty() => (password.clone(), false),
        _ => (generate_random_string(16), true),
    };

    let created = state
        .services
        .users
        .initialize_admin(&auth.admin_username, &password, auth.admin_email.clone())
        .await?;

    if created.is_none() {
        return Ok(());
    }

    info!("===========================================");
    info!("Initial admin user created!");
    info!("Username: {}", auth.admin_username);
    if generated {
        info!("Password: {}", password);
    } else {
        info!("Password: (set via configuration)");
    }
    info!("Please change this password after first login.");
    info!("===========================================");

    Ok(())
}

fn spawn_job_sweeper(services: Services) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(JOB_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = services.jobs.timeout_late_jobs().await {
                error!(error = %e, "Failed to time out late async jobs");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_creates_admin_once() {
        let config = AppConfig::default();
        let state = create_app_state(&config).await.unwrap();

        bootstrap(&state, &config).await.unwrap();
        create_initial_admin_user(&state, &config).await.unwrap();

        let admin = state.services.users.find_by_username("admin").await.unwrap();
        assert!(state
            .services
            .permissions
            .is_organization_admin(admin.id().as_str())
            .await
            .unwrap());

        let users = state
            .services
            .users
            .search(None, domain::Pageable::default())
            .await
            .unwrap();
        assert_eq!(users.total_elements, 1);
    }

    #[test]
    fn test_generate_random_string() {
        let value = generate_random_string(16);
        assert_eq!(value.len(), 16);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
