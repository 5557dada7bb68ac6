//! CLI command implementations

pub mod exhibits;
pub mod pull;
pub mod serve;

pub use exhibits::ExhibitsArgs;
pub use pull::PullArgs;
pub use serve::ServeArgs;
