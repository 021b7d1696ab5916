//! Application configuration

mod app_config;

pub use app_config::{
    AlertsConfig, AppConfig, AuthConfig, EnvironmentConfig, LogFormat, LoggingConfig,
    ServerConfig, StorageSettings,
};
