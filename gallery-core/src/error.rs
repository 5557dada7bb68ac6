//! Error types for the gallery

use thiserror::Error;

/// Result type alias for gallery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gallery operations
///
/// Failures of the pull itself are not reported through this type; they are
/// folded into a [`crate::CloneOutcome`] so callers see a stable taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git error outside of a pull (inspecting local clones)
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A clone request that violates its invariants
    #[error("Invalid clone request: {0}")]
    InvalidRequest(String),

    /// Unknown exhibit id
    #[error("exhibit_id {0} not found")]
    ExhibitNotFound(i64),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
