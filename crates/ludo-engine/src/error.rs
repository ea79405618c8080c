//! Error types for the rules engine.

use crate::Color;

/// A command that the rules reject.
///
/// Rejections never mutate the match. The room layer turns each variant
/// into a wire `ErrorReason` and sends it to the offending client only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    /// The token index is outside `0..4`.
    #[error("token {0} does not exist")]
    NoSuchToken(usize),

    /// Somebody other than the current color tried to act.
    #[error("it is not {0}'s turn")]
    NotYourTurn(Color),

    /// A move arrived without a roll to consume.
    #[error("no pending roll to move with")]
    NoPendingRoll,

    /// A second roll arrived before the first one was consumed.
    #[error("a roll is already pending")]
    RollAlreadyPending,

    /// The rolled value cannot take this token anywhere legal
    /// (home without a six, home-stretch overshoot, blockade).
    #[error("move leads to an illegal destination")]
    IllegalDestination,

    /// The selected token is already finished.
    #[error("token has already finished")]
    TokenAlreadyFinished,

    /// The match is still waiting for players, or already over.
    #[error("match is not in progress")]
    MatchNotInProgress,
}

/// Match state that should be unreachable if the rules are correct.
///
/// Detecting one of these force-cancels the room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("match invariant violated: {0}")]
pub struct InvariantViolation(pub String);
