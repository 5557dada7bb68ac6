//! Pull command - clone or update one exhibit from the terminal

use clap::Args;
use gallery_core::{ExhibitCatalog, GalleryConfig, Puller, Secrets};

/// Clone or update one exhibit
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Exhibit id, as shown by `gallery exhibits`
    exhibit_id: i64,

    /// Override the configured deadline (e.g. "30s", "10m")
    #[arg(long, value_parser = humantime_duration)]
    timeout: Option<std::time::Duration>,

    /// Only print the outcome
    #[arg(short, long)]
    quiet: bool,
}

fn humantime_duration(value: &str) -> Result<std::time::Duration, String> {
    humantime::parse_duration(value).map_err(|e| format!("invalid duration '{}': {}", value, e))
}

impl PullArgs {
    /// Execute the pull command
    pub async fn execute(&self, verbose: bool, config: &GalleryConfig) -> anyhow::Result<()> {
        let secrets = Secrets::load()?;
        let catalog = ExhibitCatalog::from_config(config);
        let exhibit = catalog.get(self.exhibit_id)?;

        let timeout = self.timeout.unwrap_or(config.pull.timeout);
        let request = exhibit.clone_request(timeout, &secrets);

        println!(
            "Pulling {} into {}",
            exhibit.title(),
            exhibit.local_path().display()
        );
        if verbose {
            println!("  url: {}", exhibit.clone_url());
            println!("  timeout: {}s", timeout.as_secs());
        }

        let mut handle = Puller::default().run(request)?;
        while let Some(event) = handle.progress().next().await {
            if !self.quiet {
                println!("  {}", event.message);
            }
        }

        let outcome = handle.outcome().await;
        if outcome.is_success() {
            println!("Done: {}", outcome);
            Ok(())
        } else {
            anyhow::bail!("Pull of exhibit {} failed: {}", self.exhibit_id, outcome)
        }
    }
}
