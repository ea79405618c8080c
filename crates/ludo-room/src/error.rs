//! Error types for the room layer.

use ludo_engine::{RoomCode, RuleViolation, UserId};
use ludo_protocol::ErrorReason;

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No such room, or the room has already finished.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The match is running and the user holds no seat in it.
    #[error("match in room {0} has already started")]
    MatchAlreadyStarted(RoomCode),

    /// The user has no seat in this room (or gave it up).
    #[error("user {0} is not seated in room {1}")]
    NotSeated(UserId, RoomCode),

    /// The rules refused the command.
    #[error(transparent)]
    Rule(#[from] RuleViolation),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The reason code sent back to the client.
    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::NotFound(_) | Self::Unavailable(_) => ErrorReason::RoomNotFound,
            Self::RoomFull(_) => ErrorReason::RoomFull,
            Self::MatchAlreadyStarted(_) => ErrorReason::MatchAlreadyStarted,
            Self::NotSeated(..) => ErrorReason::NotSeated,
            Self::Rule(violation) => ErrorReason::from(*violation),
        }
    }
}
