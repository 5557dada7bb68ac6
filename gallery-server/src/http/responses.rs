//! HTTP request and response types.

use gallery_core::{CloneOutcome, ExhibitState, ProgressEvent};
use serde::{Deserialize, Serialize};

/// Version of the gallery API reported to the front-end
pub const API_VERSION: &str = "1.0";

/// Response for the gallery endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryInfo {
    pub title: String,
    pub api_version: String,
    pub exhibits_configured: bool,
    pub hide_gallery_without_exhibits: bool,
}

/// Response for the exhibits endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExhibitsResponse {
    pub exhibits: Vec<ExhibitState>,
}

/// Request body for the pull endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequest {
    pub exhibit_id: i64,
}

/// Response for a completed pull.
#[derive(Debug, Serialize, Deserialize)]
pub struct PullResponse {
    /// Human-readable summary of the outcome
    pub message: String,
    pub outcome: CloneOutcome,
    pub progress: Vec<ProgressEvent>,
}

/// Payload of the final `outcome` event of a streamed pull.
#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub message: String,
    /// HTTP status the non-streaming endpoint would have answered with
    pub status: u16,
    pub outcome: CloneOutcome,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
