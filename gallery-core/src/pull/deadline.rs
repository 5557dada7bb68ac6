//! Deadline enforcement for pulls
//!
//! A [`DeadlineGuard`] runs a timer on its own task. Whichever happens first,
//! expiry or [`DeadlineGuard::disarm`], wins a compare-and-set on a shared
//! flag; the loser has no effect.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

const ARMED: u8 = 0;
const DISARMED: u8 = 1;
const FIRED: u8 = 2;

/// Timer that runs a callback if the guarded operation overruns
#[derive(Debug)]
pub struct DeadlineGuard {
    state: Arc<AtomicU8>,
    timer: JoinHandle<()>,
}

impl DeadlineGuard {
    /// Start the countdown
    ///
    /// `on_expire` runs at most once, on the timer task, and only if
    /// [`disarm`](Self::disarm) has not been called first.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(timeout: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(ARMED));
        let flag = Arc::clone(&state);

        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if flag
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!(?timeout, "Deadline expired");
                on_expire();
            }
        });

        Self { state, timer }
    }

    /// Stop the countdown
    ///
    /// Returns `true` if the guarded operation beat the deadline (including
    /// when already disarmed), `false` if the deadline had already fired.
    pub fn disarm(&self) -> bool {
        match self
            .state
            .compare_exchange(ARMED, DISARMED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.timer.abort();
                true
            }
            Err(current) => current == DISARMED,
        }
    }

    #[cfg(test)]
    fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&fired);
        (fired, move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_fires_after_timeout() {
        let (fired, on_expire) = counter();
        let guard = DeadlineGuard::arm(Duration::from_millis(20), on_expire);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(guard.has_fired());
        assert!(!guard.disarm());
    }

    #[tokio::test]
    async fn test_disarm_before_expiry_prevents_callback() {
        let (fired, on_expire) = counter();
        let guard = DeadlineGuard::arm(Duration::from_millis(50), on_expire);

        assert!(guard.disarm());
        // Second disarm is harmless and still reports the operation won
        assert!(guard.disarm());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!guard.has_fired());
    }

    #[tokio::test]
    async fn test_drop_disarms() {
        let (fired, on_expire) = counter();
        drop(DeadlineGuard::arm(Duration::from_millis(20), on_expire));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_disarm_expire_race_has_single_winner() {
        for _ in 0..200 {
            let (fired, on_expire) = counter();
            let guard = DeadlineGuard::arm(Duration::from_micros(200), on_expire);

            let disarmer = tokio::task::spawn_blocking(move || {
                std::thread::sleep(Duration::from_micros(200));
                let won = guard.disarm();
                (won, guard)
            });
            let (won, guard) = disarmer.await.unwrap();

            if won {
                tokio::time::sleep(Duration::from_millis(1)).await;
                assert_eq!(fired.load(Ordering::SeqCst), 0, "callback ran after disarm won");
                assert!(!guard.has_fired());
            } else {
                // The callback runs right after the flag flips on the timer task
                let give_up = std::time::Instant::now() + Duration::from_secs(1);
                while fired.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < give_up {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                assert_eq!(fired.load(Ordering::SeqCst), 1);
                assert!(guard.has_fired());
            }
        }
    }
}
