//! Exhibit list handler.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::http::responses::ExhibitsResponse;
use crate::state::AppState;

/// List exhibits with the state of their local clones.
pub async fn list_exhibits(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExhibitsResponse>, ApiError> {
    // Opening repositories touches the filesystem
    let exhibits = tokio::task::spawn_blocking(move || state.catalog.states())
        .await
        .map_err(|e| ApiError::Internal(format!("exhibit inspection failed: {}", e)))?;

    Ok(Json(ExhibitsResponse { exhibits }))
}
