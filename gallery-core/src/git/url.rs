//! Repository URL parsing

use std::path::Path;

use crate::{Error, Result};

/// Parsed repository information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrl {
    /// Repository owner/organization (parent directory for local paths)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Full clone URL
    pub clone_url: String,
    /// Host (e.g., "github.com"); empty for local repositories
    pub host: String,
}

impl RepoUrl {
    /// Parse a repository URL or shorthand
    ///
    /// Supports:
    /// - `https://github.com/owner/repo`
    /// - `https://github.com/owner/repo.git`
    /// - `git@github.com:owner/repo.git`
    /// - `owner/repo` (assumes GitHub)
    /// - `file:///path/to/repo` and absolute local paths
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.starts_with("file://") || Path::new(input).is_absolute() {
            return Self::parse_local(input);
        }

        // Handle owner/repo shorthand (assumes GitHub)
        if !input.contains("://") && !input.contains('@') && input.contains('/') {
            let parts: Vec<&str> = input.split('/').collect();
            if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
                let owner = parts[0].to_string();
                let repo = parts[1].trim_end_matches(".git").to_string();
                return Ok(Self {
                    clone_url: format!("https://github.com/{}/{}.git", owner, repo),
                    owner,
                    repo,
                    host: "github.com".to_string(),
                });
            }
        }

        // Handle git@ URLs (e.g., git@github.com:owner/repo.git)
        if let Some(rest) = input.strip_prefix("git@") {
            if let Some((host, path)) = rest.split_once(':') {
                let path = path.trim_end_matches(".git");
                let parts: Vec<&str> = path.split('/').collect();
                if parts.len() >= 2 {
                    return Ok(Self {
                        owner: parts[0].to_string(),
                        repo: parts[1].to_string(),
                        clone_url: input.to_string(),
                        host: host.to_string(),
                    });
                }
            }
        }

        if input.starts_with("https://") || input.starts_with("http://") {
            if let Ok(url) = url::Url::parse(input) {
                let host = url.host_str().unwrap_or("").to_string();
                let path = url
                    .path()
                    .trim_start_matches('/')
                    .trim_end_matches('/')
                    .trim_end_matches(".git");
                let parts: Vec<&str> = path.split('/').collect();

                // Nested groups (gitlab) keep the last two segments
                if parts.len() >= 2 {
                    let owner = parts[parts.len() - 2].to_string();
                    let repo = parts[parts.len() - 1].to_string();

                    return Ok(Self {
                        owner,
                        repo,
                        clone_url: input.to_string(),
                        host,
                    });
                }
            }
        }

        Err(Error::Config(format!(
            "Invalid repository URL: {}. Expected format: owner/repo, https://host/owner/repo, git@host:owner/repo.git or a local path",
            input
        )))
    }

    fn parse_local(input: &str) -> Result<Self> {
        let path = input.strip_prefix("file://").unwrap_or(input);
        let path = Path::new(path.trim_end_matches('/'));

        let repo = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.trim_end_matches(".git").to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Config(format!("Invalid repository path: {}", input)))?;

        let owner = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        Ok(Self {
            owner,
            repo,
            clone_url: input.to_string(),
            host: String::new(),
        })
    }

    /// Social card image GitHub renders for the repository
    ///
    /// Only GitHub serves these; other hosts return `None`.
    pub fn social_card_url(&self) -> Option<String> {
        if self.host.eq_ignore_ascii_case("github.com") {
            Some(format!(
                "https://opengraph.githubassets.com/1/{}/{}",
                self.owner, self.repo
            ))
        } else {
            None
        }
    }
}

/// Normalize a remote URL for equality checks
///
/// Trailing slashes and a `.git` suffix do not change which repository a URL
/// points to.
pub fn normalize_remote(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed
        .strip_suffix(".git")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}
