//! Clone request parameters

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Everything needed to clone or update one repository
#[derive(Clone)]
pub struct CloneRequest {
    /// URL (or local path) of the remote repository
    pub repository_url: String,
    /// Working tree to create or update
    pub destination: PathBuf,
    /// Token sent as the password to the remote
    pub auth_token: Option<String>,
    /// Account sent as the username along with the token
    pub account: Option<String>,
    /// Branch to check out; the remote's default branch when unset
    pub branch: Option<String>,
    /// History depth for shallow clones
    pub depth: Option<u32>,
    /// Deadline for the whole operation
    pub timeout: Duration,
}

// The token must never end up in logs.
impl std::fmt::Debug for CloneRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneRequest")
            .field("repository_url", &self.repository_url)
            .field("destination", &self.destination)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("account", &self.account)
            .field("branch", &self.branch)
            .field("depth", &self.depth)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CloneRequest {
    /// Create a request with no credentials, branch or depth
    pub fn new(
        repository_url: impl Into<String>,
        destination: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            repository_url: repository_url.into(),
            destination: destination.into(),
            auth_token: None,
            account: None,
            branch: None,
            depth: None,
            timeout,
        }
    }

    /// Check out `branch` instead of the remote default
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Limit the history fetched to `depth` commits
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Authenticate with a token, optionally as a specific account
    pub fn with_credentials(mut self, account: Option<String>, token: impl Into<String>) -> Self {
        self.account = account;
        self.auth_token = Some(token.into());
        self
    }

    /// Reject requests that cannot possibly succeed
    pub fn validate(&self) -> Result<()> {
        if self.repository_url.trim().is_empty() {
            return Err(Error::InvalidRequest("repository URL is empty".to_string()));
        }

        if self.destination.as_os_str().is_empty() {
            return Err(Error::InvalidRequest("destination path is empty".to_string()));
        }

        if self.timeout.is_zero() {
            return Err(Error::InvalidRequest("timeout must be greater than zero".to_string()));
        }

        if self.depth == Some(0) {
            return Err(Error::InvalidRequest("depth must be at least 1".to_string()));
        }

        Ok(())
    }
}
