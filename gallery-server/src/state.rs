//! Shared application state.

use std::sync::Arc;

use gallery_core::{ExhibitCatalog, GalleryConfig, Puller, Secrets};
use tracing::{info, warn};

use crate::registry::PullRegistry;

/// Shared application state.
pub struct AppState {
    /// Effective configuration.
    pub config: GalleryConfig,

    /// Exhibits built from the configuration.
    pub catalog: ExhibitCatalog,

    /// Git credentials for private exhibits.
    pub secrets: Secrets,

    /// Runs clone/update operations.
    pub puller: Puller,

    /// Working trees with a pull in progress.
    pub registry: PullRegistry,

    /// Token clients must present.
    token: String,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("exhibits", &self.catalog.len())
            .field("destination", &self.config.destination)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create state that pulls with libgit2.
    pub fn new(config: GalleryConfig, secrets: Secrets, token: String) -> Arc<Self> {
        Self::with_puller(config, secrets, token, Puller::default())
    }

    /// Create state with a specific puller.
    pub fn with_puller(
        config: GalleryConfig,
        secrets: Secrets,
        token: String,
        puller: Puller,
    ) -> Arc<Self> {
        Arc::new(Self {
            catalog: ExhibitCatalog::from_config(&config),
            config,
            secrets,
            puller,
            registry: PullRegistry::new(),
            token,
        })
    }

    /// Create state, picking the server token from config, then secrets
    ///
    /// With neither set a random token is generated and logged so the
    /// operator can reach the API; the server never runs unauthenticated.
    pub fn from_config(config: GalleryConfig, secrets: Secrets) -> Arc<Self> {
        let token = match config
            .server
            .token
            .clone()
            .or_else(|| secrets.server_token())
        {
            Some(token) => token,
            None => {
                let token = uuid::Uuid::new_v4().simple().to_string();
                warn!("No server token configured; generated one for this run");
                info!(%token, "Use this token in the Authorization header or gallery-token cookie");
                token
            }
        };

        Self::new(config, secrets, token)
    }

    /// The token clients must present.
    pub fn token(&self) -> &str {
        &self.token
    }
}
