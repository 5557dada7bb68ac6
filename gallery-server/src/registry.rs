//! In-flight pull registry
//!
//! Two pulls writing the same working tree would corrupt it, so at most one
//! pull per destination may run at a time. Exhibits whose repositories share
//! a name share a destination, so the destination is the key, not the
//! exhibit. Holding a [`PullLease`] is what "running" means; dropping it
//! frees the destination.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Destinations with a pull in progress
#[derive(Debug, Clone, Default)]
pub struct PullRegistry {
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl PullRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `destination`, or `None` if a pull into it is already running
    pub fn try_acquire(&self, destination: &Path) -> Option<PullLease> {
        if !self.lock().insert(destination.to_path_buf()) {
            return None;
        }

        debug!(destination = %destination.display(), "Pull lease acquired");
        Some(PullLease {
            registry: self.clone(),
            destination: destination.to_path_buf(),
        })
    }

    pub fn is_active(&self, destination: &Path) -> bool {
        self.lock().contains(destination)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to write one working tree
#[derive(Debug)]
pub struct PullLease {
    registry: PullRegistry,
    destination: PathBuf,
}

impl Drop for PullLease {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.destination);
        debug!(destination = %self.destination.display(), "Pull lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected_until_release() {
        let registry = PullRegistry::new();
        let tutorial = Path::new("/srv/gallery/tutorial");

        let lease = registry.try_acquire(tutorial).unwrap();
        assert!(registry.is_active(tutorial));
        assert!(registry.try_acquire(tutorial).is_none());

        // Other destinations are independent
        let other = registry.try_acquire(Path::new("/srv/gallery/nebari"));
        assert!(other.is_some());

        drop(lease);
        assert!(!registry.is_active(tutorial));
        assert!(registry.try_acquire(tutorial).is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = PullRegistry::new();
        let clone = registry.clone();
        let nebari = Path::new("/srv/gallery/nebari");

        let _lease = registry.try_acquire(nebari).unwrap();
        assert!(clone.try_acquire(nebari).is_none());
    }

    #[test]
    fn test_lease_released_on_other_thread() {
        let registry = PullRegistry::new();
        let nebari = Path::new("/srv/gallery/nebari");

        let lease = registry.try_acquire(nebari).unwrap();
        std::thread::spawn(move || drop(lease)).join().unwrap();
        assert!(!registry.is_active(nebari));
    }
}
