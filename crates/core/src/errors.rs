use thiserror::Error;

use crate::config::ConfigError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("table `{0}` was not found")]
    MissingTable(String),
    #[error("table `{table}` is missing required columns: [{}]", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },
}

/// Failure of the tabular store collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("store decode failure: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Failure of a single messaging API call. Never fatal for a run.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("{method} rejected by api: {description}")]
    Api { method: String, description: String },
    #[error("{method} still rate limited after {attempts} attempts")]
    RateLimited { method: String, attempts: u32 },
    #[error("{method} transport failure: {message}")]
    Transport { method: String, message: String },
    #[error("{method} returned an unexpected result: {message}")]
    UnexpectedResult { method: String, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("run lock failure: {0}")]
    Lock(String),
}

impl ApplicationError {
    /// Stable machine-readable class for operator output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::MissingTable(_)) => "missing_table",
            Self::Domain(DomainError::MissingColumns { .. }) => "missing_columns",
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::Configuration(_) => "config_validation",
            Self::Lock(_) => "run_lock",
        }
    }

    /// Configuration-class errors abort before anything is mutated.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(self, Self::Domain(_) | Self::Configuration(_))
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}
