//! HTTP routes for the gallery.
//!
//! Provides endpoints under [`BASE_PATH`] for:
//! - Gallery metadata (`/gallery`)
//! - Exhibit list with clone state (`/exhibits`)
//! - Pulling an exhibit (`/pull`, `/pull/stream`)
//! - Health check (`/health`, unauthenticated)

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::AppState;

mod handlers;
pub mod responses;

pub use handlers::outcome_status;

/// Prefix of every route
pub const BASE_PATH: &str = "/jupyterlab-gallery";

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/gallery", get(handlers::gallery_info))
        .route("/exhibits", get(handlers::list_exhibits))
        .route("/pull", post(handlers::pull))
        .route("/pull/stream", post(handlers::pull_stream))
        // Applies only to the routes above
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ))
        .route("/health", get(handlers::health_check));

    Router::new()
        .nest(BASE_PATH, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
