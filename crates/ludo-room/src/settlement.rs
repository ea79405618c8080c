//! Hook into the external settlement service.
//!
//! When a match completes, the room spawns [`SettlementHook::settle`] on
//! its own task and moves on. The result is logged and never fed back
//! into the match: a failed payout does not un-win a game.

use std::future::Future;

use ludo_engine::{Color, RoomCode, UserId};

/// The final result of a completed match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub room_code: RoomCode,
    pub winner_color: Color,
    pub winner: UserId,
    /// Everyone who held a seat, in turn order, including the winner.
    pub players: Vec<(Color, UserId)>,
}

/// Failure reported by the settlement service.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("settlement service unavailable: {0}")]
    Unavailable(String),

    #[error("settlement rejected: {0}")]
    Rejected(String),
}

/// Called exactly once for every match that ends with a winner.
///
/// Cancelled matches are never settled.
pub trait SettlementHook: Send + Sync + 'static {
    fn settle(
        &self,
        outcome: MatchOutcome,
    ) -> impl Future<Output = Result<(), SettlementError>> + Send;
}
