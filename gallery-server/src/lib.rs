//! Gallery Server - HTTP API for the example gallery
//!
//! All routes live under [`BASE_PATH`]. Everything except the health check
//! requires the server token, see [`auth`].

pub mod auth;
pub mod error;
pub mod http;
pub mod registry;
pub mod state;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use error::{ApiError, Error, Result};
pub use http::{create_router, BASE_PATH};
pub use registry::{PullLease, PullRegistry};
pub use state::AppState;

/// Serve the API on `bind` until Ctrl-C
pub async fn serve(state: Arc<AppState>, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(
        addr = %listener.local_addr()?,
        base_path = BASE_PATH,
        exhibits = state.catalog.len(),
        "Gallery server listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gallery server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}
