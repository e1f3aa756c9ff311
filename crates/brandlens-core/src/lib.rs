//! Shared configuration and domain vocabulary for the `BrandLens` workspace.

pub mod app_config;
pub mod config;
pub mod domain;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use domain::{
    EventFilters, ExtractionMethod, IntegrationLogStatus, IntegrationStatus, MentionEvent, Plan,
    TeamRole,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Error returned when a stored enum value is not one of the known variants.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
