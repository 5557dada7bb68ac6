//! Exhibit catalog
//!
//! Exhibits come from configuration and never change while the process runs.
//! An exhibit's id is its position in the configured list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GalleryConfig;
use crate::git::{normalize_remote, GitRepo, RepoUrl};
use crate::pull::CloneRequest;
use crate::secrets::Secrets;
use crate::{Error, Result};

/// One `[[exhibits]]` entry
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct ExhibitConfig {
    /// Repository to clone
    pub git: String,

    /// Display title
    pub title: String,

    #[serde(default)]
    pub homepage: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Thumbnail URL; derived for GitHub repositories when unset
    #[serde(default)]
    pub icon: Option<String>,

    /// Branch to check out instead of the remote default
    #[serde(default)]
    pub branch: Option<String>,

    /// Shallow clone depth
    #[serde(default)]
    pub depth: Option<u32>,

    /// Account for private repositories; overrides secrets.toml
    #[serde(default)]
    pub account: Option<String>,

    /// Token for private repositories; overrides secrets.toml
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

// Tokens must not reach logs.
impl std::fmt::Debug for ExhibitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExhibitConfig")
            .field("git", &self.git)
            .field("title", &self.title)
            .field("branch", &self.branch)
            .field("depth", &self.depth)
            .field("account", &self.account)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Clone state of an exhibit, as reported to the front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhibitState {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub is_cloned: bool,
    pub local_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// RFC 3339 commit time of HEAD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates_available: Option<bool>,
}

/// A configured exhibit with its derived paths
#[derive(Debug, Clone)]
pub struct Exhibit {
    id: i64,
    config: ExhibitConfig,
    repo: Option<RepoUrl>,
    local_path: PathBuf,
}

impl Exhibit {
    fn new(id: i64, config: ExhibitConfig, root: &Path) -> Self {
        let repo = RepoUrl::parse(&config.git).ok();
        let name = match &repo {
            Some(repo) => repo.repo.clone(),
            None => fallback_name(&config.git),
        };

        Self {
            id,
            local_path: root.join(name),
            config,
            repo,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    /// URL handed to git
    ///
    /// The `owner/repo` shorthand expands to its GitHub URL; anything that
    /// does not parse is passed through unchanged.
    pub fn clone_url(&self) -> &str {
        self.repo
            .as_ref()
            .map_or(self.config.git.as_str(), |repo| repo.clone_url.as_str())
    }

    /// Working tree the exhibit is cloned into
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Thumbnail for the exhibit
    ///
    /// An explicit, non-empty icon wins; otherwise GitHub repositories get
    /// their social card.
    pub fn icon_url(&self) -> Option<String> {
        match self.config.icon.as_deref().map(str::trim) {
            Some(icon) if !icon.is_empty() => Some(icon.to_string()),
            _ => self.repo.as_ref().and_then(RepoUrl::social_card_url),
        }
    }

    /// Build the pull request for this exhibit
    ///
    /// Credentials configured on the exhibit take precedence over the
    /// per-host entries of the secrets file.
    pub fn clone_request(&self, timeout: Duration, secrets: &Secrets) -> CloneRequest {
        let mut request = CloneRequest::new(self.clone_url(), &self.local_path, timeout);

        if let Some(branch) = &self.config.branch {
            request = request.with_branch(branch.clone());
        }
        if let Some(depth) = self.config.depth {
            request = request.with_depth(depth);
        }

        if let Some(token) = &self.config.token {
            request = request.with_credentials(self.config.account.clone(), token.clone());
        } else if let Some(repo) = &self.repo {
            let credential = secrets.git_credential(&repo.host);
            if let Some(token) = credential.and_then(|c| c.token.as_ref()) {
                debug!(exhibit_id = self.id, host = %repo.host, "Using credentials from secrets file");
                let account = self
                    .config
                    .account
                    .clone()
                    .or_else(|| credential.and_then(|c| c.account.clone()));
                request = request.with_credentials(account, token.clone());
            }
        }

        request
    }

    /// Inspect the local clone
    ///
    /// Read-only and offline: update availability reflects the last fetch.
    pub fn state(&self) -> ExhibitState {
        let mut state = ExhibitState {
            id: self.id,
            title: self.config.title.clone(),
            description: self.config.description.clone(),
            homepage: self.config.homepage.clone(),
            icon: self.icon_url(),
            is_cloned: false,
            local_path: self.local_path.display().to_string(),
            revision: None,
            last_updated: None,
            updates_available: None,
        };

        let Ok(repo) = GitRepo::open(&self.local_path) else {
            return state;
        };

        // Refuse to claim a checkout of some other repository
        let matches_origin = repo
            .origin_url()
            .is_some_and(|origin| normalize_remote(&origin) == normalize_remote(self.clone_url()));
        if !matches_origin {
            return state;
        }

        state.is_cloned = true;
        if let Ok(Some(head)) = repo.head_commit() {
            state.revision = Some(head.id);
            state.last_updated = Some(head.time.to_rfc3339());
        }
        state.updates_available = repo.updates_available().ok().flatten();

        state
    }
}

fn fallback_name(git: &str) -> String {
    normalize_remote(git)
        .rsplit(['/', ':', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("exhibit")
        .to_string()
}

/// All configured exhibits, in configuration order
#[derive(Debug, Clone, Default)]
pub struct ExhibitCatalog {
    exhibits: Vec<Exhibit>,
}

impl ExhibitCatalog {
    /// Build the catalog; ids are assigned from 0 in list order
    pub fn from_config(config: &GalleryConfig) -> Self {
        let exhibits = config
            .exhibits
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, exhibit)| Exhibit::new(index as i64, exhibit, &config.destination))
            .collect();

        Self { exhibits }
    }

    /// Look up an exhibit by id
    pub fn get(&self, id: i64) -> Result<&Exhibit> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.exhibits.get(index))
            .ok_or(Error::ExhibitNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exhibit> {
        self.exhibits.iter()
    }

    pub fn len(&self) -> usize {
        self.exhibits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exhibits.is_empty()
    }

    /// Current state of every exhibit
    pub fn states(&self) -> Vec<ExhibitState> {
        self.exhibits.iter().map(Exhibit::state).collect()
    }
}
