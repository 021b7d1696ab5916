//! Infrastructure layer: storage, services and security primitives

pub mod alert;
pub mod api;
pub mod api_key;
pub mod application;
pub mod async_job;
pub mod audit;
pub mod auth;
pub mod group;
pub mod membership;
pub mod observability;
pub mod permission;
pub mod plan;
pub mod role;
pub mod services;
pub mod storage;
pub mod subscription;
pub mod user;
