//! Full match state as sent to a joining or reconnecting client.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use ludo_engine::{
    BlockPolicy, Board, Color, MatchState, MatchStatus, Position, RoomCode, TOKENS_PER_COLOR,
    TurnPhase, UserId,
};

use crate::{ProtocolError, decode_position, encode_position};

/// One occupied seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatSnapshot {
    pub color: Color,
    pub user_id: UserId,
    pub connected: bool,
    pub abandoned: bool,
}

/// Wire positions of one color's tokens, indexed by token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTokens {
    pub color: Color,
    pub positions: [i16; TOKENS_PER_COLOR],
}

/// Everything a client needs to draw the board and know whose turn it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub room_code: RoomCode,
    pub status: MatchStatus,
    pub block_policy: BlockPolicy,
    pub seats: Vec<SeatSnapshot>,
    pub turn_order: Vec<Color>,
    pub current_turn_color: Option<Color>,
    pub phase: TurnPhase,
    pub pending_dice: Option<u8>,
    pub consecutive_sixes: u8,
    /// Only colors in the turn order are listed.
    pub tokens: Vec<ColorTokens>,
    pub winner_color: Option<Color>,
    /// Milliseconds left before the current turn is passed.
    pub turn_remaining_ms: Option<u64>,
}

impl MatchSnapshot {
    /// Captures `state` as of `now`.
    pub fn capture(state: &MatchState, policy: BlockPolicy, now: Instant) -> Self {
        Self {
            room_code: state.room_code.clone(),
            status: state.status,
            block_policy: policy,
            seats: state
                .players
                .iter()
                .map(|p| SeatSnapshot {
                    color: p.color,
                    user_id: p.user_id.clone(),
                    connected: p.is_connected(),
                    abandoned: p.abandoned,
                })
                .collect(),
            turn_order: state.turn_order.clone(),
            current_turn_color: state.current_color(),
            phase: state.phase,
            pending_dice: state.pending_dice,
            consecutive_sixes: state.consecutive_sixes,
            tokens: state
                .turn_order
                .iter()
                .map(|&color| ColorTokens {
                    color,
                    positions: (*state.board.tokens(color)).map(|pos| encode_position(color, pos)),
                })
                .collect(),
            winner_color: state.winner,
            turn_remaining_ms: state
                .turn_deadline
                .map(|d| d.saturating_duration_since(now).as_millis() as u64),
        }
    }

    /// Rebuilds the board from the wire positions.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidPosition`] if any position does not decode
    /// for its color.
    pub fn board(&self) -> Result<Board, ProtocolError> {
        let mut board = Board::new();
        for row in &self.tokens {
            for (token, raw) in row.positions.iter().enumerate() {
                let position: Position = decode_position(row.color, *raw)?;
                board.place(row.color, token, position);
            }
        }
        Ok(board)
    }

    pub fn seat_of(&self, user_id: &UserId) -> Option<Color> {
        self.seats.iter().find(|s| &s.user_id == user_id).map(|s| s.color)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use ludo_engine::SeatCount;

    fn sample_state() -> MatchState {
        let mut state = MatchState::new(RoomCode::new("SNAP"), SeatCount::Two);
        state.seat(UserId::new("alice"));
        state.seat(UserId::new("bob"));
        state.status = MatchStatus::InProgress;
        state.phase = TurnPhase::AwaitingMove;
        state.pending_dice = Some(6);
        state.board.place(Color::Red, 0, Position::OnRing(1));
        state.board.place(Color::Green, 2, Position::OnHomeStretch(4));
        state.board.place(Color::Green, 3, Position::Finished);
        state
    }

    #[test]
    fn test_capture_encodes_active_colors_only() {
        let now = Instant::now();
        let mut state = sample_state();
        state.turn_deadline = Some(now + Duration::from_secs(12));

        let snap = MatchSnapshot::capture(&state, BlockPolicy::Open, now);
        assert_eq!(snap.tokens.len(), 2);
        assert_eq!(snap.tokens[0].color, Color::Red);
        assert_eq!(snap.tokens[0].positions, [1, -1, -1, -1]);
        assert_eq!(snap.tokens[1].positions, [-1, -1, 204, 206]);
        assert_eq!(snap.current_turn_color, Some(Color::Red));
        assert_eq!(snap.pending_dice, Some(6));
        assert_eq!(snap.turn_remaining_ms, Some(12_000));
        assert_eq!(snap.seat_of(&UserId::new("bob")), Some(Color::Green));
    }

    #[test]
    fn test_board_rebuilds_positions() {
        let state = sample_state();
        let snap = MatchSnapshot::capture(&state, BlockPolicy::Open, Instant::now());
        assert_eq!(snap.board().unwrap(), state.board);
    }

    #[test]
    fn test_board_rejects_foreign_stretch_value() {
        let state = sample_state();
        let mut snap = MatchSnapshot::capture(&state, BlockPolicy::Open, Instant::now());
        snap.tokens[0].positions[1] = 203;
        assert!(snap.board().is_err());
    }

    #[test]
    fn test_snapshot_json_uses_camel_case() {
        let state = sample_state();
        let snap = MatchSnapshot::capture(&state, BlockPolicy::Blockade, Instant::now());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["roomCode"], "SNAP");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["blockPolicy"], "blockade");
        assert_eq!(json["currentTurnColor"], "red");
        assert_eq!(json["seats"][0]["userId"], "alice");
        assert_eq!(json["tokens"][1]["positions"], serde_json::json!([-1, -1, 204, 206]));
    }
}
