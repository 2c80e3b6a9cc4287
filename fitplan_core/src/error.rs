//! Error types for the fitplan_core library.

use crate::session::{SessionAction, SessionPhase};
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fitplan_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// The profile is missing fields the generator needs
    #[error("Profile incomplete, missing: {}", .0.join(", "))]
    ProfileIncomplete(Vec<String>),

    /// No exercise in the catalog could be selected at all
    #[error("Catalog has no exercises to generate a workout from")]
    EmptyCatalog,

    /// A session action was requested while it is not available
    #[error("Action {action:?} is not available while {phase:?}")]
    ActionDisabled {
        action: SessionAction,
        phase: SessionPhase,
    },

    /// Rating outside of 1..=5
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    /// Another session already holds the user's session lock
    #[error("A workout session is already active for user '{0}'")]
    SessionLocked(String),

    /// Session record does not belong to the plan entry it was applied to
    #[error("Plan mismatch: {0}")]
    PlanMismatch(String),

    /// Progress store failed to persist a session
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the same operation with the same input may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Persistence(_))
    }
}
