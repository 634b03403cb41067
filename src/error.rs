//! Custom error types for playbooks

use thiserror::Error;

/// Main error type for playbooks operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Playbook not found: {0}")]
    PlaybookNotFound(String),

    #[error("Playbook variant not found: {0}")]
    VariantNotFound(String),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Cannot {action} experiment {id}: status is '{status}'")]
    StateConflict {
        id: String,
        status: String,
        action: String,
    },

    #[error("Malformed recipe for {owner}: {reason}")]
    MalformedRecipe { owner: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not initialized: run 'playbooks init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for caller-facing business-rule failures (bad input, missing
    /// records, invalid state transitions).
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::PlaybookNotFound(_)
                | Error::VariantNotFound(_)
                | Error::ExperimentNotFound(_)
                | Error::ContentNotFound(_)
                | Error::StateConflict { .. }
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(format!("{:#}", err))
    }
}

/// Result type alias for playbooks
pub type Result<T> = std::result::Result<T, Error>;
