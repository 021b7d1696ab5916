//! Application domain

mod entity;
mod repository;

pub use entity::{
    ApiKeyMode, AppSettings, Application, ApplicationCriteria, ApplicationId,
    ApplicationSettings, ApplicationStatus, ApplicationType, OAuthClientSettings,
};
pub use repository::ApplicationRepository;

#[cfg(test)]
pub use repository::MockApplicationRepository;
