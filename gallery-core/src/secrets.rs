//! Secrets management for the gallery
//!
//! Secrets are stored separately from configuration so the exhibit list can be
//! shared without leaking credentials. The secrets file is located at
//! `~/.config/gallery/secrets.toml` and must have restrictive permissions
//! (0600 on Unix).
//!
//! ```toml
//! [server]
//! token = "..."
//!
//! [git."github.com"]
//! account = "octocat"
//! token = "ghp_..."
//! ```
//!
//! Loading priority for the server token:
//! 1. Environment variable (GALLERY_TOKEN)
//! 2. Secrets file

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// Server secrets
    pub server: ServerSecrets,

    /// Git credentials keyed by remote host (e.g. "github.com")
    pub git: HashMap<String, GitCredential>,
}

/// Server-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSecrets {
    /// API token clients must present
    pub token: Option<String>,
}

/// Credentials used when pulling from a private remote
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitCredential {
    /// Account name sent as the username
    pub account: Option<String>,
    /// Personal access token sent as the password
    pub token: Option<String>,
}

impl Secrets {
    /// Read `~/.config/gallery/secrets.toml`, or nothing if it is absent
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Read a secrets file, refusing one that other users can read
    pub fn load_from_file(path: &Path) -> Result<Self> {
        ensure_private(path)?;

        let raw = std::fs::read_to_string(path)?;
        let mut secrets: Self = toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("{} is not valid secrets TOML: {}", path.display(), e))
        })?;

        trim_token(&mut secrets.server.token);
        secrets
            .git
            .values_mut()
            .for_each(|credential| trim_token(&mut credential.token));

        debug!(
            path = %path.display(),
            hosts = secrets.git.len(),
            "Loaded secrets"
        );
        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/gallery/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gallery").join("secrets.toml"))
    }

    /// Get the server token with environment variable override
    ///
    /// Priority: GALLERY_TOKEN env var > secrets file
    pub fn server_token(&self) -> Option<String> {
        let from_env = std::env::var("GALLERY_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if from_env.is_some() {
            debug!("Server token taken from GALLERY_TOKEN");
        }

        from_env.or_else(|| self.server.token.clone())
    }

    /// Credentials for a remote host, if any were configured
    pub fn git_credential(&self, host: &str) -> Option<&GitCredential> {
        self.git
            .get(host)
            .filter(|credential| credential.token.is_some())
    }
}

#[cfg(unix)]
fn ensure_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
    if mode & 0o077 == 0 {
        return Ok(());
    }

    Err(Error::Config(format!(
        "{} is accessible by other users (mode {:o}); run `chmod 600 {}`",
        path.display(),
        mode,
        path.display()
    )))
}

#[cfg(not(unix))]
fn ensure_private(_path: &Path) -> Result<()> {
    Ok(())
}

fn trim_token(token: &mut Option<String>) {
    if let Some(value) = token.take() {
        let value = value.trim().to_string();
        if !value.is_empty() {
            *token = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_secrets() {
        let secrets = Secrets::default();
        assert!(secrets.server.token.is_none());
        assert!(secrets.git.is_empty());
    }

    #[test]
    fn test_parse_secrets() {
        let toml = r#"
[server]
token = "abc"

[git."github.com"]
account = "octocat"
token = "ghp_xxxxxxxxxxxx"
"#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.server.token.as_deref(), Some("abc"));
        let credential = secrets.git_credential("github.com").unwrap();
        assert_eq!(credential.account.as_deref(), Some("octocat"));
        assert_eq!(credential.token.as_deref(), Some("ghp_xxxxxxxxxxxx"));
        assert!(secrets.git_credential("gitlab.com").is_none());
    }

    #[test]
    fn test_credential_without_token_ignored() {
        let toml = r#"
[git."gitlab.com"]
account = "someone"
"#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert!(secrets.git_credential("gitlab.com").is_none());
    }

    #[cfg(unix)]
    fn secrets_file(contents: &str, mode: u32) -> NamedTempFile {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(mode)).unwrap();
        file
    }

    #[cfg(unix)]
    #[test]
    fn test_group_readable_file_refused() {
        let file = secrets_file("[server]\ntoken = \"test\"\n", 0o640);

        let err = Secrets::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("chmod 600"));
    }

    #[cfg(unix)]
    #[test]
    fn test_private_file_loaded_and_trimmed() {
        let file = secrets_file(
            "[server]\ntoken = \"  srv  \"\n\n[git.\"github.com\"]\ntoken = \" ghp_test \"\n",
            0o600,
        );

        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.server.token.as_deref(), Some("srv"));
        assert_eq!(
            secrets.git_credential("github.com").unwrap().token.as_deref(),
            Some("ghp_test")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_blank_token_dropped() {
        let file = secrets_file("[git.\"github.com\"]\ntoken = \"   \"\n", 0o600);

        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert!(secrets.git_credential("github.com").is_none());
    }
}
