//! Gallery CLI - Command line interface for the example gallery
//!
//! Serves the gallery API, or pulls and lists exhibits without a server.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gallery_core::{GalleryConfig, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ExhibitsArgs, PullArgs, ServeArgs};

/// Gallery: clone example repositories into a workspace
#[derive(Parser, Debug)]
#[command(name = "gallery")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/gallery/config.toml)
    #[arg(short, long, global = true, env = "GALLERY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory exhibits are cloned into (overrides config and env)
    #[arg(long, global = true)]
    destination: Option<PathBuf>,

    /// Address the server binds to (overrides config and env)
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Run the HTTP API
    #[command(visible_alias = "s")]
    Serve(ServeArgs),

    /// Clone or update one exhibit
    #[command(visible_alias = "p")]
    Pull(PullArgs),

    /// List exhibits and their clone state
    #[command(visible_alias = "ls")]
    Exhibits(ExhibitsArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose only changes the fallback
    let fallback = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .init();

    let config = GalleryConfig::load_with_overrides(
        cli.config.as_deref(),
        cli.destination.clone(),
        cli.bind.clone(),
    )?;

    if cli.verbose {
        tracing::info!(
            destination = %config.destination.display(),
            bind = %config.server.bind,
            exhibits = config.exhibits.len(),
            timeout = ?config.pull.timeout,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("gallery {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve(args)) => {
            args.execute(config).await?;
        }
        Some(Commands::Pull(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Exhibits(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Config) => print_config(&config, cli.config.as_deref()),
        None => {
            println!("Gallery - clone example repositories into your workspace");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &GalleryConfig, explicit: Option<&std::path::Path>) {
    println!("Gallery Configuration");
    println!("=====================");
    println!();
    println!("  title: {}", config.title);
    println!("  destination: {}", config.destination.display());
    println!(
        "  hide_gallery_without_exhibits: {}",
        config.hide_gallery_without_exhibits
    );
    println!();
    println!("Pull Settings:");
    println!("  timeout: {}s", config.pull.timeout.as_secs());
    println!();
    println!("Server Settings:");
    println!("  bind: {}", config.server.bind);
    println!(
        "  token: {}",
        if config.server.token.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!();
    println!("Exhibits: {}", config.exhibits.len());
    for (id, exhibit) in config.exhibits.iter().enumerate() {
        println!("  [{}] {} <{}>", id, exhibit.title, exhibit.git);
    }
    println!();

    let config_path = explicit
        .map(std::path::Path::to_path_buf)
        .or_else(GalleryConfig::default_config_path);
    if let Some(path) = config_path {
        println!("Config file: {}", path.display());
        println!("  {}", existence(&path));
    }
    if let Some(path) = Secrets::default_secrets_path() {
        println!("Secrets file: {}", path.display());
        println!("  {}", existence(&path));
    }
}

fn existence(path: &std::path::Path) -> &'static str {
    if path.exists() {
        "(exists)"
    } else {
        "(not found - using defaults)"
    }
}
