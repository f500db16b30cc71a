//! Once-per-process admission of initialization targets.

use dashmap::DashSet;

/// A thread-safe set that admits each key exactly once.
///
/// Keys are never removed: a failed initialization still consumes its key,
/// so retrying requires calling the reconciler directly.
#[derive(Debug, Default)]
pub struct ConcurrentGuard {
    admitted: DashSet<String>,
}

impl ConcurrentGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `key` if no caller has done so before.
    ///
    /// The test and the insert happen under the same shard lock, so of any
    /// number of concurrent callers exactly one observes `true`.
    pub fn try_admit(&self, key: impl Into<String>) -> bool {
        self.admitted.insert(key.into())
    }

    /// Returns whether `key` has already been admitted.
    #[must_use]
    pub fn is_admitted(&self, key: &str) -> bool {
        self.admitted.contains(key)
    }

    /// Number of admitted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    /// Returns whether no key has been admitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}
