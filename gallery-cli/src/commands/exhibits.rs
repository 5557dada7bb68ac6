//! Exhibits command - list exhibits and the state of their clones

use clap::Args;
use gallery_core::{ExhibitCatalog, GalleryConfig};

/// List exhibits and their clone state
#[derive(Args, Debug)]
pub struct ExhibitsArgs {
    /// Print the same JSON the API returns
    #[arg(long)]
    json: bool,
}

impl ExhibitsArgs {
    /// Execute the exhibits command
    pub async fn execute(&self, config: &GalleryConfig) -> anyhow::Result<()> {
        let catalog = ExhibitCatalog::from_config(config);
        let states = catalog.states();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&states)?);
            return Ok(());
        }

        if states.is_empty() {
            println!("No exhibits configured.");
            return Ok(());
        }

        for state in &states {
            let status = match (state.is_cloned, state.updates_available) {
                (false, _) => "not cloned",
                (true, Some(true)) => "updates available",
                (true, _) => "cloned",
            };
            println!("  [{}] {} ({})", state.id, state.title, status);
            if let Some(description) = &state.description {
                println!("      {}", description);
            }
            println!("      path: {}", state.local_path);
            if let Some(revision) = &state.revision {
                let short: String = revision.chars().take(7).collect();
                println!(
                    "      revision: {} ({})",
                    short,
                    state.last_updated.as_deref().unwrap_or("unknown")
                );
            }
        }

        Ok(())
    }
}
