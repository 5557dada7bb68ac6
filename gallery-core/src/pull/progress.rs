//! Progress reporting between the pull worker and its consumer
//!
//! The worker side ([`ProgressReporter`]) never blocks: events go into an
//! unbounded channel. The consumer side ([`ProgressStream`]) waits only until
//! the next event arrives or the pull terminates.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One line of human-readable status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Status text
    pub message: String,
    /// Position in the pull's event sequence, starting at 0
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct Sequencer {
    next: u64,
    sealed: bool,
}

/// Producer half: appends events to a pull's progress sequence
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    sequencer: Arc<Mutex<Sequencer>>,
    closed: CancellationToken,
}

impl ProgressReporter {
    /// Create a connected reporter/stream pair
    pub fn channel() -> (ProgressReporter, ProgressStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let reporter = ProgressReporter {
            tx,
            sequencer: Arc::new(Mutex::new(Sequencer::default())),
            closed: closed.clone(),
        };

        (reporter, ProgressStream { rx, closed })
    }

    /// Append an event, visible to the consumer immediately
    ///
    /// Events emitted after [`close`](Self::close) are dropped.
    pub fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        // Sequence assignment and send happen under one lock so the channel
        // order always matches the sequence numbers.
        let mut sequencer = self.sequencer.lock().unwrap_or_else(PoisonError::into_inner);
        if sequencer.sealed {
            tracing::trace!(%message, "dropping progress after termination");
            return;
        }

        tracing::debug!(sequence = sequencer.next, %message, "pull progress");
        let event = ProgressEvent {
            message,
            sequence: sequencer.next,
        };
        if self.tx.send(event).is_ok() {
            sequencer.next += 1;
        }
    }

    #[cfg(test)]
    fn emitted(&self) -> u64 {
        self.sequencer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next
    }

    /// Terminate the sequence; the consumer sees the end once it has read
    /// everything emitted before this call
    pub fn close(&self) {
        self.sequencer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sealed = true;
        self.closed.cancel();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Consumer half: a forward-only, finite sequence of progress events
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    closed: CancellationToken,
}

impl ProgressStream {
    /// Wait for the next event
    ///
    /// Returns `None` once the pull has terminated and every event emitted
    /// before termination has been returned. Calling again after that keeps
    /// returning `None`.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        tokio::select! {
            biased;
            event = self.rx.recv() => event,
            _ = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }

    /// Lazy view of the remaining events, resuming from the current position
    pub fn drain(&mut self) -> impl Stream<Item = ProgressEvent> + '_ {
        stream::unfold(self, |stream| async move {
            let event = stream.next().await?;
            Some((event, stream))
        })
    }
}
