use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::errors::DomainError;

/// Failures surfaced by the binary while bootstrapping or running.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
