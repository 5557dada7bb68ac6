//! Serve command - run the gallery HTTP API

use clap::Args;
use gallery_core::{GalleryConfig, Secrets};
use gallery_server::AppState;

/// Run the HTTP API
#[derive(Args, Debug)]
pub struct ServeArgs {}

impl ServeArgs {
    /// Execute the serve command
    pub async fn execute(&self, config: GalleryConfig) -> anyhow::Result<()> {
        let secrets = Secrets::load()?;
        let bind = config.server.bind.clone();

        let state = AppState::from_config(config, secrets);
        gallery_server::serve(state, &bind).await?;

        Ok(())
    }
}
