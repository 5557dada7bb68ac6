//! Terminal pull outcomes and the translation of backend failures into them

use std::fmt;

use git2::{ErrorClass, ErrorCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{GitFailure, PullSuccess};

/// Caller-visible result of a pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CloneOutcome {
    /// Fresh clone or update finished on `branch`
    Success { branch: String },
    /// The local clone already matched the remote
    AlreadyUpToDate,
    /// The deadline fired before the operation finished
    TimedOut,
    /// The remote rejected (or demanded) credentials
    AuthenticationFailed,
    /// The remote does not have the repository
    RepositoryNotFound,
    /// Transport failure or anything unclassified
    NetworkError { detail: String },
    /// The destination cannot be cloned into or updated
    InvalidDestination { detail: String },
}

impl CloneOutcome {
    /// Success or already up to date
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::AlreadyUpToDate)
    }

    /// Short stable identifier, matching the serialized `status` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::AlreadyUpToDate => "already_up_to_date",
            Self::TimedOut => "timed_out",
            Self::AuthenticationFailed => "authentication_failed",
            Self::RepositoryNotFound => "repository_not_found",
            Self::NetworkError { .. } => "network_error",
            Self::InvalidDestination { .. } => "invalid_destination",
        }
    }
}

impl fmt::Display for CloneOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { branch } => write!(f, "pulled branch {}", branch),
            Self::AlreadyUpToDate => write!(f, "already up to date"),
            Self::TimedOut => write!(f, "timed out"),
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::RepositoryNotFound => write!(f, "repository not found"),
            Self::NetworkError { detail } => write!(f, "network error: {}", detail),
            Self::InvalidDestination { detail } => write!(f, "invalid destination: {}", detail),
        }
    }
}

/// Map a backend result onto the outcome taxonomy
pub fn translate(result: Result<PullSuccess, GitFailure>) -> CloneOutcome {
    match result {
        Ok(PullSuccess::Cloned { branch }) | Ok(PullSuccess::Updated { branch }) => {
            CloneOutcome::Success { branch }
        }
        Ok(PullSuccess::UpToDate) => CloneOutcome::AlreadyUpToDate,
        Err(failure) => {
            let outcome = classify_failure(&failure);
            warn!(error = %failure, outcome = outcome.kind(), "Pull failed");
            outcome
        }
    }
}

fn classify_failure(failure: &GitFailure) -> CloneOutcome {
    match failure {
        GitFailure::Cancelled => CloneOutcome::TimedOut,
        GitFailure::InvalidDestination(detail) => CloneOutcome::InvalidDestination {
            detail: detail.clone(),
        },
        GitFailure::BranchResolution(detail) => CloneOutcome::NetworkError {
            detail: format!("could not resolve branch: {}", detail),
        },
        GitFailure::Io(err) => CloneOutcome::NetworkError {
            detail: err.to_string(),
        },
        GitFailure::Git(err) => classify_git_error(err),
    }
}

fn classify_git_error(err: &git2::Error) -> CloneOutcome {
    let message = err.message();

    match (err.code(), err.class()) {
        (ErrorCode::Auth, _) => return CloneOutcome::AuthenticationFailed,
        // A missing branch or ref is a resolution problem, not a missing repo
        (_, ErrorClass::Reference) => {
            return CloneOutcome::NetworkError {
                detail: message.to_string(),
            }
        }
        (ErrorCode::Conflict, _) | (_, ErrorClass::Checkout) => {
            return CloneOutcome::InvalidDestination {
                detail: message.to_string(),
            }
        }
        (ErrorCode::NotFound, ErrorClass::Os)
        | (ErrorCode::NotFound, ErrorClass::Net)
        | (ErrorCode::NotFound, ErrorClass::Http)
        | (ErrorCode::NotFound, ErrorClass::Ssh)
        | (ErrorCode::NotFound, ErrorClass::Repository) => {
            return CloneOutcome::RepositoryNotFound
        }
        _ => {}
    }

    classify_message(message).unwrap_or_else(|| CloneOutcome::NetworkError {
        detail: message.to_string(),
    })
}

/// Classify free-text error output from a git transport
fn classify_message(message: &str) -> Option<CloneOutcome> {
    let lower = message.to_lowercase();

    const AUTH_MARKERS: &[&str] = &[
        "401",
        "403",
        "authentication",
        "credentials",
        "permission denied",
        "unauthorized",
    ];
    const NOT_FOUND_MARKERS: &[&str] = &[
        "404",
        "repository not found",
        "could not find repository",
        "does not exist",
        "not found",
    ];

    if AUTH_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return Some(CloneOutcome::AuthenticationFailed);
    }

    if NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return Some(CloneOutcome::RepositoryNotFound);
    }

    None
}
