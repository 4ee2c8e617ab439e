//! Exclusivity token
//!
//! A single shared token serializing access to the expensive
//! parse/traversal resource. Constructed once by the owning service
//! and passed by reference; never recreated. The holder counters exist
//! so tests can observe that no two operations ever run at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// The single token guarding AST access
#[derive(Debug, Default)]
pub struct ExclusiveToken {
    lock: Mutex<()>,
    holders: AtomicUsize,
    max_holders: AtomicUsize,
    acquisitions: AtomicUsize,
}

/// Held while an operation runs; releases the token on drop
pub struct TokenGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    token: &'a ExclusiveToken,
}

impl ExclusiveToken {
    /// Create the token
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the token is free, then hold it
    pub fn acquire(&self) -> TokenGuard<'_> {
        let guard = self
            .lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = self.holders.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_holders.fetch_max(now, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        TokenGuard {
            _guard: guard,
            token: self,
        }
    }

    /// Highest number of simultaneous holders ever observed.
    /// Anything above 1 is a violation of the single-flight discipline.
    pub fn max_observed_holders(&self) -> usize {
        self.max_holders.load(Ordering::SeqCst)
    }

    /// Total number of acquisitions
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl Drop for TokenGuard<'_> {
    fn drop(&mut self) {
        self.token.holders.fetch_sub(1, Ordering::SeqCst);
    }
}
