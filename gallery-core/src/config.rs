//! Configuration management for the gallery
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GALLERY_*)
//! 3. Config file (~/.config/gallery/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exhibit::ExhibitConfig;
use crate::{Error, Result};

/// Pull-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PullConfig {
    /// Deadline for a single clone or update (e.g. "90s", "5m")
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub bind: String,

    /// Token required by the API; generated at startup when unset
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8888".to_string(),
            token: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Title shown above the gallery
    pub title: String,

    /// Root directory exhibits are cloned into
    pub destination: PathBuf,

    /// Whether the front-end should hide the gallery when no exhibits exist
    pub hide_gallery_without_exhibits: bool,

    /// Pull configuration
    pub pull: PullConfig,

    /// Server configuration
    pub server: ServerConfig,

    /// Exhibits offered for cloning, in display order
    pub exhibits: Vec<ExhibitConfig>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            title: "Gallery".to_string(),
            destination: PathBuf::from("gallery"),
            hide_gallery_without_exhibits: false,
            pull: PullConfig::default(),
            server: ServerConfig::default(),
            exhibits: Vec::new(),
        }
    }
}

impl GalleryConfig {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/gallery/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gallery").join("config.toml"))
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if self.pull.timeout.is_zero() {
            return Err(Error::Config("pull.timeout must be greater than zero".to_string()));
        }

        for (index, exhibit) in self.exhibits.iter().enumerate() {
            if exhibit.git.trim().is_empty() {
                return Err(Error::Config(format!(
                    "exhibit #{} ({}) has an empty git URL",
                    index, exhibit.title
                )));
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GALLERY_DESTINATION: Root directory for clones
    /// - GALLERY_BIND: Server bind address
    /// - GALLERY_TOKEN: Server API token
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(destination) = std::env::var("GALLERY_DESTINATION") {
            self.destination = PathBuf::from(destination);
        }

        if let Ok(bind) = std::env::var("GALLERY_BIND") {
            self.server.bind = bind;
        }

        if let Ok(token) = std::env::var("GALLERY_TOKEN") {
            let token = token.trim().to_string();
            if !token.is_empty() {
                self.server.token = Some(token);
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, destination: Option<PathBuf>, bind: Option<String>) -> Self {
        if let Some(dir) = destination {
            self.destination = dir;
        }

        if let Some(b) = bind {
            self.server.bind = b;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        config_path: Option<&Path>,
        destination: Option<PathBuf>,
        bind: Option<String>,
    ) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };

        Ok(base.with_env_overrides().with_cli_overrides(destination, bind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GalleryConfig::default();
        assert_eq!(config.title, "Gallery");
        assert_eq!(config.destination, PathBuf::from("gallery"));
        assert_eq!(config.pull.timeout, Duration::from_secs(300));
        assert!(config.exhibits.is_empty());
        assert!(config.server.token.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = GalleryConfig::default()
            .with_cli_overrides(Some(PathBuf::from("/srv/examples")), Some("0.0.0.0:9000".to_string()));

        assert_eq!(config.destination, PathBuf::from("/srv/examples"));
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
title = "Examples"
destination = "/home/jovyan/examples"

[pull]
timeout = "90s"

[[exhibits]]
git = "https://github.com/nebari-dev/nebari.git"
homepage = "https://github.com/nebari-dev/nebari"
title = "Nebari"
description = "Nebari - your open source data science platform"

[[exhibits]]
git = "https://github.com/jupyter-widgets/tutorial.git"
title = "Jupyter Widgets Tutorial"
branch = "main"
depth = 1
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.title, "Examples");
        assert_eq!(config.pull.timeout, Duration::from_secs(90));
        assert_eq!(config.exhibits.len(), 2);
        assert_eq!(config.exhibits[1].branch.as_deref(), Some("main"));
        assert_eq!(config.exhibits[1].depth, Some(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[server]
bind = "0.0.0.0:8888"
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        // Everything else should use defaults
        assert_eq!(config.title, "Gallery");
        assert_eq!(config.server.bind, "0.0.0.0:8888");
        assert_eq!(config.pull.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = r#"
[pull]
timeout = "0s"
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pull.timeout"));
    }

    #[test]
    fn test_empty_git_url_rejected() {
        let toml = r#"
[[exhibits]]
git = "  "
title = "Broken"
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
