//! Match configuration.

use std::time::Duration;

use ludo_engine::{BlockPolicy, SeatCount};
use tracing::warn;

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    /// Players per match. The match starts as soon as every seat is taken.
    pub seats: SeatCount,

    /// How long the current player has to roll, and then to move, before
    /// the turn is passed.
    pub turn_timeout: Duration,

    /// How long a disconnected seat is held before it counts as abandoned.
    pub reconnect_grace: Duration,

    /// How long a finished room keeps answering before it is torn down.
    pub retention: Duration,

    pub block_policy: BlockPolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            seats: SeatCount::Two,
            turn_timeout: Duration::from_secs(30),
            reconnect_grace: Duration::from_secs(30),
            retention: Duration::from_secs(5),
            block_policy: BlockPolicy::Open,
        }
    }
}

impl MatchConfig {
    pub const MIN_TURN_TIMEOUT: Duration = Duration::from_secs(1);
    pub const MAX_TURN_TIMEOUT: Duration = Duration::from_secs(600);
    pub const MAX_RECONNECT_GRACE: Duration = Duration::from_secs(600);
    pub const MAX_RETENTION: Duration = Duration::from_secs(60);

    /// Returns a copy with out-of-range values clamped.
    ///
    /// - `turn_timeout` clamped to `1s..=10min`.
    /// - `reconnect_grace` capped at 10 min.
    /// - `retention` capped at 1 min.
    pub fn validated(mut self) -> Self {
        let timeout = self
            .turn_timeout
            .clamp(Self::MIN_TURN_TIMEOUT, Self::MAX_TURN_TIMEOUT);
        if timeout != self.turn_timeout {
            warn!(
                requested = ?self.turn_timeout,
                clamped = ?timeout,
                "turn_timeout out of range, clamping"
            );
            self.turn_timeout = timeout;
        }
        if self.reconnect_grace > Self::MAX_RECONNECT_GRACE {
            warn!(
                requested = ?self.reconnect_grace,
                max = ?Self::MAX_RECONNECT_GRACE,
                "reconnect_grace exceeds maximum, clamping"
            );
            self.reconnect_grace = Self::MAX_RECONNECT_GRACE;
        }
        if self.retention > Self::MAX_RETENTION {
            warn!(
                requested = ?self.retention,
                max = ?Self::MAX_RETENTION,
                "retention exceeds maximum, clamping"
            );
            self.retention = Self::MAX_RETENTION;
        }
        self
    }
}
