//! Keyed deadline timers for room actors.
//!
//! A room has a handful of independent clocks: the current turn, one
//! reconnection grace window per disconnected seat, and the retention
//! window after a match ends. [`Deadlines`] holds all of them under
//! caller-chosen keys and yields whichever fires first.
//!
//! # Integration
//!
//! The timer set sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         key = deadlines.expired() => { /* handle the expired timer */ }
//!     }
//! }
//! ```
//!
//! With nothing armed, [`Deadlines::expired`] pends forever, so an idle
//! room only reacts to commands.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::trace;

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

/// A small set of one-shot timers keyed by `K`.
///
/// Re-arming a key replaces its previous deadline. Expired keys are removed
/// before they are returned, so each arm fires at most once.
#[derive(Debug, Clone)]
pub struct Deadlines<K> {
    entries: Vec<(K, Instant)>,
}

impl<K> Default for Deadlines<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + std::fmt::Debug> Deadlines<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire at `at`, replacing any earlier deadline for it.
    pub fn arm(&mut self, key: K, at: Instant) {
        trace!(?key, "deadline armed");
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = at,
            None => self.entries.push((key, at)),
        }
    }

    /// Arm `key` to fire `after` from now.
    pub fn arm_after(&mut self, key: K, after: Duration) {
        self.arm(key, Instant::now() + after);
    }

    /// Cancel `key`. Returns `true` if it was armed.
    pub fn disarm(&mut self, key: K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != key);
        before != self.entries.len()
    }

    pub fn is_armed(&self, key: K) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// When `key` fires, if armed.
    pub fn deadline(&self, key: K) -> Option<Instant> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, at)| *at)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every timer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Wait for the earliest armed deadline, disarm it and return its key.
    ///
    /// Pends forever when nothing is armed. Cancel-safe: if the future is
    /// dropped before it resolves, no timer is consumed.
    pub async fn expired(&mut self) -> K {
        let Some((key, at)) = self.earliest() else {
            return std::future::pending::<K>().await;
        };

        time::sleep_until(at).await;

        self.disarm(key);
        trace!(?key, "deadline fired");
        key
    }

    fn earliest(&self) -> Option<(K, Instant)> {
        self.entries.iter().copied().min_by_key(|(_, at)| *at)
    }
}
