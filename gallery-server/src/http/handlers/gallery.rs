//! Gallery metadata handler.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::http::responses::{GalleryInfo, API_VERSION};
use crate::state::AppState;

/// Title and display settings for the gallery.
pub async fn gallery_info(State(state): State<Arc<AppState>>) -> Json<GalleryInfo> {
    Json(GalleryInfo {
        title: state.config.title.clone(),
        api_version: API_VERSION.to_string(),
        exhibits_configured: !state.catalog.is_empty(),
        hide_gallery_without_exhibits: state.config.hide_gallery_without_exhibits,
    })
}
