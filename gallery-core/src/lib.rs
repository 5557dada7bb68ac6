//! Gallery Core - Core library for the example gallery
//!
//! This crate provides the exhibit catalog and the pull machinery that clones
//! or updates an exhibit's repository with a deadline, a live progress stream,
//! and a small set of typed outcomes.

pub mod config;
pub mod error;
pub mod exhibit;
pub mod git;
pub mod pull;
pub mod secrets;

pub use config::{GalleryConfig, PullConfig, ServerConfig};
pub use error::{Error, Result};
pub use exhibit::{Exhibit, ExhibitCatalog, ExhibitConfig, ExhibitState};
pub use git::{Git2Backend, GitRepo, RepoUrl};
pub use pull::{
    CancellationToken, CloneOutcome, CloneRequest, DeadlineGuard, GitBackend, GitFailure,
    ProgressEvent, ProgressReporter, ProgressStream, PullEvent, PullHandle, PullSuccess, Puller,
};
pub use secrets::{GitCredential, Secrets};
