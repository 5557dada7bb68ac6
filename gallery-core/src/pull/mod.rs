//! Timeout-bounded clone/update of exhibit repositories
//!
//! [`Puller::run`] starts one pull on a blocking worker, arms a
//! [`DeadlineGuard`], and hands back a [`PullHandle`] that yields progress
//! events followed by exactly one [`CloneOutcome`].

mod deadline;
mod orchestrator;
mod outcome;
mod progress;
mod request;

use thiserror::Error;

pub use deadline::DeadlineGuard;
pub use orchestrator::{PullEvent, PullHandle, Puller};
pub use outcome::{translate, CloneOutcome};
pub use progress::{ProgressEvent, ProgressReporter, ProgressStream};
pub use request::CloneRequest;
pub use tokio_util::sync::CancellationToken;

/// What a backend did when it succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullSuccess {
    /// Fresh clone of `branch`
    Cloned { branch: String },
    /// Existing clone moved forward to the tip of `branch`
    Updated { branch: String },
    /// Existing clone already at the remote tip
    UpToDate,
}

/// Tool-level failure reported by a backend, before translation
#[derive(Error, Debug)]
pub enum GitFailure {
    /// libgit2 error
    #[error("{0}")]
    Git(#[from] git2::Error),

    /// Filesystem error while preparing the destination
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The cancellation token fired mid-operation
    #[error("operation cancelled")]
    Cancelled,

    /// Destination exists but cannot be used
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// The branch to check out could not be determined
    #[error("could not resolve branch: {0}")]
    BranchResolution(String),
}

/// The git operations a pull needs
///
/// Implementations run on a blocking worker thread. They must report progress
/// through `progress` and should check `cancel` at every safe point, returning
/// [`GitFailure::Cancelled`] promptly once it fires.
pub trait GitBackend: Send + Sync + 'static {
    /// Clone `request.repository_url` into `request.destination`, or update
    /// the clone already there
    fn pull(
        &self,
        request: &CloneRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PullSuccess, GitFailure>;
}
