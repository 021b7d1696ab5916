//! Permission checks

mod service;

pub use service::PermissionService;
