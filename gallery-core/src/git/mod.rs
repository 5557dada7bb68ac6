//! Git operations for the gallery
//!
//! This module provides repository URL parsing, inspection of local clones,
//! and the libgit2-backed implementation of [`crate::pull::GitBackend`].

mod backend;
mod repo;
mod url;

pub use backend::Git2Backend;
pub use repo::{GitRepo, HeadCommit};
pub use url::{normalize_remote, RepoUrl};
