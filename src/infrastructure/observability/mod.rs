//! Observability: tracing, metrics and logging setup

mod config;
mod metrics;
mod tracing_setup;

pub use config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use metrics::{
    create_metrics_router, init_metrics, record_api_lifecycle_change, record_http_request,
    record_subscription_processed, PrometheusMetrics,
};
pub use tracing_setup::{init_tracing, shutdown_tracing};
