//! Pull handlers.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{Stream, StreamExt};
use gallery_core::{CloneOutcome, PullEvent, PullHandle};
use tracing::info;

use crate::error::ApiError;
use crate::http::responses::{OutcomeEvent, PullRequest, PullResponse};
use crate::state::AppState;

type SseEventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// HTTP status reported for a pull outcome
pub fn outcome_status(outcome: &CloneOutcome) -> StatusCode {
    match outcome {
        CloneOutcome::Success { .. } | CloneOutcome::AlreadyUpToDate => StatusCode::OK,
        CloneOutcome::RepositoryNotFound => StatusCode::NOT_ACCEPTABLE,
        CloneOutcome::AuthenticationFailed => StatusCode::FORBIDDEN,
        CloneOutcome::InvalidDestination { .. } => StatusCode::CONFLICT,
        CloneOutcome::NetworkError { .. } => StatusCode::BAD_GATEWAY,
        CloneOutcome::TimedOut => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// Claim the exhibit's working tree and start pulling into it
///
/// The worker owns the lease, so the tree stays claimed after a timeout or a
/// client disconnect until the worker has actually stopped writing.
fn start_pull(state: &AppState, exhibit_id: i64) -> Result<PullHandle, ApiError> {
    let exhibit = state.catalog.get(exhibit_id)?;
    let lease = state
        .registry
        .try_acquire(exhibit.local_path())
        .ok_or(ApiError::PullInProgress(exhibit.id()))?;

    let request = exhibit.clone_request(state.config.pull.timeout, &state.secrets);
    info!(
        exhibit_id,
        title = %exhibit.title(),
        url = %exhibit.clone_url(),
        destination = %exhibit.local_path().display(),
        "Pull requested"
    );

    Ok(state.puller.run_holding(request, lease)?)
}

/// Pull an exhibit and report the outcome with all progress lines.
pub async fn pull(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PullRequest>,
) -> Result<Response, ApiError> {
    let handle = start_pull(&state, body.exhibit_id)?;
    let (progress, outcome) = handle.wait_with_progress().await;

    let status = outcome_status(&outcome);
    info!(
        exhibit_id = body.exhibit_id,
        outcome = outcome.kind(),
        status = status.as_u16(),
        events = progress.len(),
        "Pull completed"
    );

    let response = PullResponse {
        message: outcome.to_string(),
        outcome,
        progress,
    };
    Ok((status, Json(response)).into_response())
}

/// Pull an exhibit, streaming progress as Server-Sent Events.
///
/// Emits `progress` events, then exactly one `outcome` event.
pub async fn pull_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PullRequest>,
) -> Result<Sse<SseEventStream>, ApiError> {
    let handle = start_pull(&state, body.exhibit_id)?;
    let exhibit_id = body.exhibit_id;

    let events: SseEventStream = Box::pin(handle.into_events().map(move |event| {
        if let PullEvent::Finished(outcome) = &event {
            info!(exhibit_id, outcome = outcome.kind(), "Streamed pull completed");
        }
        Ok::<_, Infallible>(to_sse_event(event))
    }));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: PullEvent) -> Event {
    let result = match event {
        PullEvent::Progress(progress) => Event::default()
            .event("progress")
            .id(progress.sequence.to_string())
            .json_data(progress),
        PullEvent::Finished(outcome) => Event::default().event("outcome").json_data(OutcomeEvent {
            message: outcome.to_string(),
            status: outcome_status(&outcome).as_u16(),
            outcome,
        }),
    };

    result.unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
