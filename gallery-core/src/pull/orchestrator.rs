//! Pull orchestration: worker, deadline and outcome publication

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, Stream};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::deadline::DeadlineGuard;
use super::outcome::{translate, CloneOutcome};
use super::progress::{ProgressEvent, ProgressReporter, ProgressStream};
use super::request::CloneRequest;
use super::GitBackend;
use crate::git::Git2Backend;
use crate::{Error, Result};

/// Lifecycle of a single pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Phase {
    Idle = 0,
    Running = 1,
    Succeeded = 2,
    TimedOut = 3,
    Failed = 4,
}

impl Phase {
    fn terminal_for(outcome: &CloneOutcome) -> Self {
        match outcome {
            CloneOutcome::Success { .. } | CloneOutcome::AlreadyUpToDate => Self::Succeeded,
            CloneOutcome::TimedOut => Self::TimedOut,
            _ => Self::Failed,
        }
    }
}

/// State shared by the worker and the deadline callback
struct PullState {
    phase: AtomicU8,
    cancel: CancellationToken,
    reporter: ProgressReporter,
    outcome_tx: Mutex<Option<oneshot::Sender<CloneOutcome>>>,
}

impl PullState {
    fn new(reporter: ProgressReporter, outcome_tx: oneshot::Sender<CloneOutcome>) -> Self {
        Self {
            phase: AtomicU8::new(Phase::Idle as u8),
            cancel: CancellationToken::new(),
            reporter,
            outcome_tx: Mutex::new(Some(outcome_tx)),
        }
    }

    fn start(&self) -> bool {
        self.transition(Phase::Idle, Phase::Running)
    }

    fn transition(&self, from: Phase, to: Phase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Publish the outcome if the pull is still running
    ///
    /// Terminal phases are absorbing: only the first caller publishes.
    fn finish(&self, outcome: CloneOutcome) -> bool {
        if !self.transition(Phase::Running, Phase::terminal_for(&outcome)) {
            return false;
        }

        self.reporter.close();
        let sender = self
            .outcome_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = sender {
            // The caller may have dropped its handle; nothing to deliver then
            let _ = tx.send(outcome);
        }
        true
    }
}

/// One item of a pull's event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullEvent {
    /// A progress line
    Progress(ProgressEvent),
    /// The terminal outcome; always the last item
    Finished(CloneOutcome),
}

/// Caller's view of a running pull
#[derive(Debug)]
pub struct PullHandle {
    progress: ProgressStream,
    outcome: oneshot::Receiver<CloneOutcome>,
}

impl PullHandle {
    /// Progress events, ending when the pull terminates
    pub fn progress(&mut self) -> &mut ProgressStream {
        &mut self.progress
    }

    /// Wait for the terminal outcome, discarding unread progress
    pub async fn outcome(self) -> CloneOutcome {
        resolve(self.outcome).await
    }

    /// Wait for termination, collecting every progress event
    pub async fn wait_with_progress(mut self) -> (Vec<ProgressEvent>, CloneOutcome) {
        let mut events = Vec::new();
        while let Some(event) = self.progress.next().await {
            events.push(event);
        }
        (events, resolve(self.outcome).await)
    }

    /// Progress events followed by the outcome as one stream
    pub fn into_events(self) -> impl Stream<Item = PullEvent> + Send + 'static {
        let PullHandle { progress, outcome } = self;

        stream::unfold(Some((progress, outcome)), |state| async move {
            let (mut progress, outcome) = state?;
            match progress.next().await {
                Some(event) => Some((PullEvent::Progress(event), Some((progress, outcome)))),
                None => Some((PullEvent::Finished(resolve(outcome).await), None)),
            }
        })
    }
}

async fn resolve(outcome: oneshot::Receiver<CloneOutcome>) -> CloneOutcome {
    outcome.await.unwrap_or_else(|_| CloneOutcome::NetworkError {
        detail: "pull worker exited without reporting an outcome".to_string(),
    })
}

/// Runs pulls against a [`GitBackend`]
#[derive(Clone)]
pub struct Puller {
    backend: Arc<dyn GitBackend>,
}

impl std::fmt::Debug for Puller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Puller").finish_non_exhaustive()
    }
}

impl Default for Puller {
    fn default() -> Self {
        Self::new(Arc::new(Git2Backend::new()))
    }
}

impl Puller {
    /// Create a puller using the given backend
    pub fn new(backend: Arc<dyn GitBackend>) -> Self {
        Self { backend }
    }

    /// Start a pull
    ///
    /// Fails only when the request is invalid or no Tokio runtime is
    /// available; every failure of the pull itself arrives as a
    /// [`CloneOutcome`] through the returned handle.
    pub fn run(&self, request: CloneRequest) -> Result<PullHandle> {
        self.run_holding(request, ())
    }

    /// Start a pull whose worker owns `held` until the backend returns
    ///
    /// A timed-out or abandoned pull keeps running until it observes
    /// cancellation, so whatever guards the working tree must live exactly
    /// as long as the worker does, not as long as the caller waits.
    pub fn run_holding<H>(&self, request: CloneRequest, held: H) -> Result<PullHandle>
    where
        H: Send + 'static,
    {
        request.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::Other("pulls must be started from a Tokio runtime".to_string()))?;

        let (reporter, progress) = ProgressReporter::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let state = Arc::new(PullState::new(reporter, outcome_tx));
        state.start();

        info!(
            url = %request.repository_url,
            destination = %request.destination.display(),
            branch = ?request.branch,
            timeout = ?request.timeout,
            "Starting pull"
        );

        let timeout = request.timeout;
        let expiring = Arc::downgrade(&state);
        let guard = DeadlineGuard::arm(timeout, move || {
            // The worker owns the state; once it is gone there is nothing to abort
            let Some(state) = expiring.upgrade() else {
                return;
            };
            state.cancel.cancel();
            state
                .reporter
                .emit(format!("Timed out after {}s", timeout.as_secs_f64()));
            if state.finish(CloneOutcome::TimedOut) {
                warn!(?timeout, "Pull exceeded its deadline");
            }
        });

        let backend = Arc::clone(&self.backend);
        runtime.spawn_blocking(move || {
            let result = backend.pull(&request, &state.reporter, &state.cancel);
            // Released before publishing so a caller that saw the outcome can pull again
            drop(held);
            let outcome = translate(result);

            if !guard.disarm() {
                debug!(discarded = outcome.kind(), "Deadline already fired; discarding result");
                return;
            }

            if state.finish(outcome.clone()) {
                info!(
                    url = %request.repository_url,
                    outcome = outcome.kind(),
                    "Pull finished"
                );
            }
        });

        Ok(PullHandle {
            progress,
            outcome: outcome_rx,
        })
    }
}
