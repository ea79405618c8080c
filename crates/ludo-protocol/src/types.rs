//! Messages that travel on the wire.
//!
//! Every frame is an [`Envelope`] around either a [`ClientMessage`]
//! (commands) or a [`ServerMessage`] (authoritative events). Both enums are
//! internally tagged with a snake_case `type` and camelCase fields:
//!
//! ```json
//! { "seq": 3, "timestamp": 1200,
//!   "payload": { "type": "move_token", "roomCode": "ABCD",
//!                "userId": "alice", "tokenIndex": 0 } }
//! ```

use serde::{Deserialize, Serialize};

use ludo_engine::{Color, RoomCode, RuleViolation, UserId};

use crate::MatchSnapshot;

/// Version a client must announce in its handshake.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wire frame.
///
/// ```text
/// ┌────────────────────────────┐
/// │ seq: 42                    │  ← per-stream counter, gaps mean loss
/// │ timestamp: 15000           │  ← ms since the sender started
/// │ ┌────────────────────────┐ │
/// │ │ payload                │ │
/// │ └────────────────────────┘ │
/// └────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, payload: T) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Commands a client may send.
///
/// Gameplay commands repeat `roomCode` and `userId`; the server checks the
/// user id against the authenticated connection before doing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// First frame on every connection.
    Handshake {
        version: u32,
        /// Credential for the external identity service.
        token: Option<String>,
        /// Resume token from an earlier `handshake_ack`, instead of `token`.
        resume_token: Option<String>,
    },

    /// Keep-alive. Echoed back in `heartbeat_ack`.
    Heartbeat { client_time: u64 },

    JoinGame { room_code: RoomCode, user_id: UserId },

    RollDice { room_code: RoomCode, user_id: UserId },

    MoveToken {
        room_code: RoomCode,
        user_id: UserId,
        token_index: usize,
    },

    LeaveGame { room_code: RoomCode, user_id: UserId },
}

impl ClientMessage {
    /// Room and user a gameplay command is addressed to.
    pub fn target(&self) -> Option<(&RoomCode, &UserId)> {
        match self {
            Self::JoinGame { room_code, user_id }
            | Self::RollDice { room_code, user_id }
            | Self::MoveToken {
                room_code, user_id, ..
            }
            | Self::LeaveGame { room_code, user_id } => Some((room_code, user_id)),
            Self::Handshake { .. } | Self::Heartbeat { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Why a command was refused. Sent to the offending client only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    NotYourTurn,
    NoPendingRoll,
    IllegalDestination,
    TokenAlreadyFinished,
    RoomFull,
    RoomNotFound,
    MatchAlreadyStarted,
    NoSuchToken,
    RollAlreadyPending,
    MatchNotInProgress,
    /// The user has no seat in the addressed room.
    NotSeated,
    /// Out-of-order or malformed command (e.g. gameplay before handshake).
    InvalidCommand,
    /// Authentication failed, or a command named another user.
    Unauthorized,
}

impl From<RuleViolation> for ErrorReason {
    fn from(violation: RuleViolation) -> Self {
        match violation {
            RuleViolation::NoSuchToken(_) => Self::NoSuchToken,
            RuleViolation::NotYourTurn(_) => Self::NotYourTurn,
            RuleViolation::NoPendingRoll => Self::NoPendingRoll,
            RuleViolation::RollAlreadyPending => Self::RollAlreadyPending,
            RuleViolation::IllegalDestination => Self::IllegalDestination,
            RuleViolation::TokenAlreadyFinished => Self::TokenAlreadyFinished,
            RuleViolation::MatchNotInProgress => Self::MatchNotInProgress,
        }
    }
}

/// Why a match ended without a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Someone left before the table filled.
    PlayerLeft,
    /// A seat's reconnection window ran out before the table filled.
    ReconnectTimeout,
    /// At most one active seat remained.
    Abandoned,
    /// The server detected corrupted match state.
    Internal,
    /// The server is shutting down.
    Shutdown,
}

/// Authoritative events and replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    HandshakeAck {
        user_id: UserId,
        /// Hand this back in a later handshake to skip re-authentication.
        resume_token: String,
        /// Room the user is still seated in, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<RoomCode>,
        server_time: u64,
    },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// To the joiner (or rejoiner) only.
    GameJoined {
        #[serde(rename = "matchSnapshot")]
        snapshot: MatchSnapshot,
        assigned_color: Color,
    },

    /// To everyone else in the room.
    PlayerJoined { color: Color, user_id: UserId },

    GameStarted {
        turn_order: Vec<Color>,
        current_turn_color: Color,
    },

    DiceRolled {
        value: u8,
        /// Who acts next. Differs from the roller when the roll passed the
        /// turn (no legal move or third six).
        current_turn_color: Color,
    },

    TokenMoved {
        color: Color,
        token_index: usize,
        new_position: i16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        captured_color: Option<Color>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        captured_token_index: Option<usize>,
        /// Absent when the move won the match.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_turn_color: Option<Color>,
    },

    PlayerLeft { color: Color },

    PlayerDisconnected { color: Color },

    PlayerReconnected { color: Color },

    /// The turn ended without a move (deadline or departed player).
    TurnPassed { current_turn_color: Color },

    GameEnded { winner_color: Color },

    GameCancelled { reason: CancelReason },

    Error { reason: ErrorReason },
}

impl ServerMessage {
    pub fn error(reason: impl Into<ErrorReason>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use ludo_engine::{BlockPolicy, MatchState, Position, SeatCount};

    use crate::encode_position;

    // =====================================================================
    // ClientMessage
    // =====================================================================

    #[test]
    fn test_join_game_json_shape() {
        let msg = ClientMessage::JoinGame {
            room_code: RoomCode::new("ABCD"),
            user_id: UserId::new("alice"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "join_game", "roomCode": "ABCD", "userId": "alice" })
        );
    }

    #[test]
    fn test_move_token_parses_from_client_json() {
        let raw = r#"{"type":"move_token","roomCode":"R1","userId":"bob","tokenIndex":2}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::MoveToken {
                room_code: RoomCode::new("R1"),
                user_id: UserId::new("bob"),
                token_index: 2,
            }
        );
    }

    #[test]
    fn test_handshake_optional_fields_may_be_missing() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"handshake","version":1}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Handshake {
                version: 1,
                token: None,
                resume_token: None,
            }
        );
    }

    #[test]
    fn test_target_only_for_gameplay_commands() {
        let roll = ClientMessage::RollDice {
            room_code: RoomCode::new("X"),
            user_id: UserId::new("u"),
        };
        assert_eq!(roll.target().map(|(r, _)| r.as_str()), Some("X"));
        assert_eq!(ClientMessage::Heartbeat { client_time: 1 }.target(), None);
    }

    #[test]
    fn test_unknown_command_type_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"teleport","roomCode":"X"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_token_index_rejected() {
        let raw = r#"{"type":"move_token","roomCode":"R","userId":"u","tokenIndex":-1}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    #[test]
    fn test_dice_rolled_json_shape() {
        let msg = ServerMessage::DiceRolled {
            value: 6,
            current_turn_color: Color::Red,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "dice_rolled", "value": 6, "currentTurnColor": "red" })
        );
    }

    #[test]
    fn test_token_moved_omits_absent_capture() {
        let msg = ServerMessage::TokenMoved {
            color: Color::Red,
            token_index: 0,
            new_position: encode_position(Color::Red, Position::OnRing(1)),
            captured_color: None,
            captured_token_index: None,
            current_turn_color: Some(Color::Red),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "token_moved");
        assert_eq!(json["newPosition"], 1);
        assert_eq!(json["currentTurnColor"], "red");
        assert!(json.get("capturedColor").is_none());
        assert!(json.get("capturedTokenIndex").is_none());
    }

    #[test]
    fn test_token_moved_with_capture() {
        let msg = ServerMessage::TokenMoved {
            color: Color::Green,
            token_index: 1,
            new_position: 30,
            captured_color: Some(Color::Red),
            captured_token_index: Some(3),
            current_turn_color: Some(Color::Green),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["capturedColor"], "red");
        assert_eq!(json["capturedTokenIndex"], 3);

        let back: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_error_reason_codes_are_pascal_case() {
        let json = serde_json::to_value(ServerMessage::error(ErrorReason::MatchAlreadyStarted)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "error", "reason": "MatchAlreadyStarted" }));
    }

    #[test]
    fn test_rule_violations_map_to_reasons() {
        assert_eq!(
            ErrorReason::from(RuleViolation::NotYourTurn(Color::Blue)),
            ErrorReason::NotYourTurn
        );
        assert_eq!(
            ErrorReason::from(RuleViolation::NoSuchToken(9)),
            ErrorReason::NoSuchToken
        );
        assert_eq!(
            ErrorReason::from(RuleViolation::TokenAlreadyFinished),
            ErrorReason::TokenAlreadyFinished
        );
    }

    #[test]
    fn test_game_cancelled_reason_snake_case() {
        let json = serde_json::to_value(ServerMessage::GameCancelled {
            reason: CancelReason::Internal,
        })
        .unwrap();
        assert_eq!(json["type"], "game_cancelled");
        assert_eq!(json["reason"], "internal");
    }

    #[test]
    fn test_game_joined_json_shape() {
        let state = MatchState::new(RoomCode::new("ABCD"), SeatCount::Two);
        let snapshot = MatchSnapshot::capture(&state, BlockPolicy::Open, Instant::now());
        let json = serde_json::to_value(ServerMessage::GameJoined {
            snapshot,
            assigned_color: Color::Red,
        })
        .unwrap();
        assert_eq!(json["type"], "game_joined");
        assert_eq!(json["assignedColor"], "red");
        assert_eq!(json["matchSnapshot"]["roomCode"], "ABCD");
        assert!(json.get("snapshot").is_none());
    }

    #[test]
    fn test_handshake_ack_without_room_omits_field() {
        let json = serde_json::to_value(ServerMessage::HandshakeAck {
            user_id: UserId::new("alice"),
            resume_token: "tok".into(),
            room_code: None,
            server_time: 10,
        })
        .unwrap();
        assert_eq!(json["userId"], "alice");
        assert_eq!(json["resumeToken"], "tok");
        assert!(json.get("roomCode").is_none());
    }

    // =====================================================================
    // Envelope
    // =====================================================================

    #[test]
    fn test_envelope_wraps_payload() {
        let env = Envelope::new(7, 1200, ServerMessage::PlayerLeft { color: Color::Yellow });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["timestamp"], 1200);
        assert_eq!(json["payload"]["type"], "player_left");
        assert_eq!(json["payload"]["color"], "yellow");
    }

    #[test]
    fn test_envelope_missing_payload_rejected() {
        let result: Result<Envelope<ClientMessage>, _> =
            serde_json::from_str(r#"{"seq":1,"timestamp":0}"#);
        assert!(result.is_err());
    }
}
