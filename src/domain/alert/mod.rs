//! Alert domain

mod entity;
mod repository;

pub use entity::{AlertReferenceType, AlertSeverity, AlertTrigger, AlertTriggerId};
pub use repository::AlertTriggerRepository;

#[cfg(test)]
pub use repository::MockAlertTriggerRepository;
