//! HTTP request handlers.

mod exhibits;
mod gallery;
mod health;
mod pull;

pub use exhibits::list_exhibits;
pub use gallery::gallery_info;
pub use health::health_check;
pub use pull::{outcome_status, pull, pull_stream};
