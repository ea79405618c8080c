//! Per-room match data and its lifecycle.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{Board, Color, InvariantViolation, RoomCode, UserId};

// ---------------------------------------------------------------------------
// MatchStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a match.
///
/// Transitions are monotonic:
///
/// ```text
/// Waiting ──→ InProgress ──→ Completed
///    │             │
///    └─────────────┴──────→ Cancelled
/// ```
///
/// Nothing leaves `Completed` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::InProgress)
                | (Self::Waiting, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Where the current turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    AwaitingRoll,
    AwaitingMove,
    /// No turn is running: the match has not started or is over.
    TurnComplete,
}

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// How many players a match seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeatCount {
    #[default]
    Two,
    Four,
}

impl SeatCount {
    pub fn seats(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    /// Fixed turn order. Seats are also handed out in this order.
    pub fn turn_order(self) -> Vec<Color> {
        match self {
            Self::Two => vec![Color::Red, Color::Green],
            Self::Four => vec![Color::Red, Color::Blue, Color::Green, Color::Yellow],
        }
    }

    pub fn from_seats(seats: usize) -> Option<Self> {
        match seats {
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Connection state of a seated player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    /// Lost at `since`; the reconnection grace window runs from here.
    Disconnected { since: Instant },
    /// Came back and is being handed a fresh snapshot.
    Reconnecting,
}

/// A seat in the match. Seats are never removed once taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub user_id: UserId,
    pub color: Color,
    pub connection: ConnectionState,
    /// Set when the grace window ran out or the player left. Abandoned
    /// seats are skipped by turn advancement.
    pub abandoned: bool,
    /// Left voluntarily; may not come back.
    pub left: bool,
}

impl Player {
    pub fn is_connected(&self) -> bool {
        matches!(self.connection, ConnectionState::Connected)
    }
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// Everything a room knows about its match.
///
/// Owned and mutated by exactly one room actor.
#[derive(Debug, Clone)]
pub struct MatchState {
    pub room_code: RoomCode,
    pub seats: SeatCount,
    pub players: Vec<Player>,
    pub board: Board,
    pub turn_order: Vec<Color>,
    pub current_turn_index: usize,
    /// Set only between a roll and the move that consumes it.
    pub pending_dice: Option<u8>,
    pub consecutive_sixes: u8,
    pub status: MatchStatus,
    pub phase: TurnPhase,
    pub turn_deadline: Option<Instant>,
    pub winner: Option<Color>,
}

impl MatchState {
    /// A fresh `Waiting` match with nobody seated.
    pub fn new(room_code: RoomCode, seats: SeatCount) -> Self {
        Self {
            room_code,
            seats,
            players: Vec::with_capacity(seats.seats()),
            board: Board::new(),
            turn_order: seats.turn_order(),
            current_turn_index: 0,
            pending_dice: None,
            consecutive_sixes: 0,
            status: MatchStatus::Waiting,
            phase: TurnPhase::TurnComplete,
            turn_deadline: None,
            winner: None,
        }
    }

    /// The color whose turn it is, while the match is running.
    pub fn current_color(&self) -> Option<Color> {
        if self.status != MatchStatus::InProgress {
            return None;
        }
        self.turn_order.get(self.current_turn_index).copied()
    }

    pub fn player(&self, user_id: &UserId) -> Option<&Player> {
        self.players.iter().find(|p| &p.user_id == user_id)
    }

    pub fn player_mut(&mut self, user_id: &UserId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.user_id == user_id)
    }

    pub fn player_by_color(&self, color: Color) -> Option<&Player> {
        self.players.iter().find(|p| p.color == color)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.seats.seats()
    }

    /// Seats `user_id` on the next free color in turn order.
    ///
    /// Returns `None` when every seat is taken.
    pub fn seat(&mut self, user_id: UserId) -> Option<Color> {
        let color = self
            .turn_order
            .iter()
            .copied()
            .find(|c| self.player_by_color(*c).is_none())?;
        self.players.push(Player {
            user_id,
            color,
            connection: ConnectionState::Connected,
            abandoned: false,
            left: false,
        });
        Some(color)
    }

    /// Seats that still take part in turns.
    pub fn active_seats(&self) -> usize {
        self.players.iter().filter(|p| !p.abandoned).count()
    }

    /// Moves the status forward, refusing anything non-monotonic.
    pub fn transition(&mut self, target: MatchStatus) -> Result<(), InvariantViolation> {
        if !self.status.can_transition_to(target) {
            return Err(InvariantViolation(format!(
                "status {} cannot become {}",
                self.status, target
            )));
        }
        self.status = target;
        if target.is_terminal() {
            self.phase = TurnPhase::TurnComplete;
            self.pending_dice = None;
            self.turn_deadline = None;
        }
        Ok(())
    }

    /// Cross-checks the fields that must agree with each other.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let fail = |msg: String| -> Result<(), InvariantViolation> { Err(InvariantViolation(msg)) };

        if self.players.len() > self.seats.seats() {
            return fail(format!("{} players in {} seats", self.players.len(), self.seats.seats()));
        }
        for (i, p) in self.players.iter().enumerate() {
            if !self.turn_order.contains(&p.color) {
                return fail(format!("{} holds inactive color {}", p.user_id, p.color));
            }
            if self.players[..i].iter().any(|q| q.color == p.color) {
                return fail(format!("color {} seated twice", p.color));
            }
        }

        for color in Color::ALL {
            for (token, pos) in self.board.tokens(color).iter().enumerate() {
                if !pos.is_well_formed() {
                    return fail(format!("{color} token {token} at malformed {pos:?}"));
                }
                if !self.turn_order.contains(&color) && !pos.is_home() {
                    return fail(format!("inactive {color} token {token} left home"));
                }
            }
        }

        if let Some(dice) = self.pending_dice {
            if !(1..=6).contains(&dice) {
                return fail(format!("pending die value {dice}"));
            }
        }
        if self.consecutive_sixes >= 3 {
            return fail(format!("{} consecutive sixes survived", self.consecutive_sixes));
        }

        match self.status {
            MatchStatus::Waiting => {
                if self.pending_dice.is_some() || self.phase != TurnPhase::TurnComplete {
                    return fail("turn running before the match started".into());
                }
            }
            MatchStatus::InProgress => {
                let Some(color) = self.current_color() else {
                    return fail(format!("turn index {} out of range", self.current_turn_index));
                };
                if self.player_by_color(color).is_none() {
                    return fail(format!("current color {color} has no player"));
                }
                let awaiting_move = self.phase == TurnPhase::AwaitingMove;
                if awaiting_move != self.pending_dice.is_some() {
                    return fail(format!(
                        "phase {:?} with pending die {:?}",
                        self.phase, self.pending_dice
                    ));
                }
                if self.phase == TurnPhase::TurnComplete || self.turn_deadline.is_none() {
                    return fail("running match has no armed turn".into());
                }
                if let Some(done) = self.turn_order.iter().find(|c| self.board.all_finished(**c)) {
                    return fail(format!("{done} finished but match still running"));
                }
            }
            MatchStatus::Completed => {
                let Some(winner) = self.winner else {
                    return fail("completed without a winner".into());
                };
                if !self.board.all_finished(winner) {
                    return fail(format!("winner {winner} has unfinished tokens"));
                }
            }
            MatchStatus::Cancelled => {}
        }

        if self.status.is_terminal() && (self.turn_deadline.is_some() || self.pending_dice.is_some()) {
            return fail("terminal match still has a live turn".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn waiting(seats: SeatCount) -> MatchState {
        MatchState::new(RoomCode::new("TEST"), seats)
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        use MatchStatus::*;
        assert!(Waiting.can_transition_to(InProgress));
        assert!(Waiting.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Waiting.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Waiting));
        assert!(!Completed.can_transition_to(Cancelled));
    }

    #[test]
    fn test_transition_out_of_terminal_rejected() {
        let mut state = waiting(SeatCount::Two);
        state.transition(MatchStatus::Cancelled).unwrap();
        assert!(state.transition(MatchStatus::InProgress).is_err());
        assert_eq!(state.status, MatchStatus::Cancelled);
    }

    #[test]
    fn test_seat_fills_turn_order() {
        let mut state = waiting(SeatCount::Four);
        let colors: Vec<Color> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|u| state.seat(UserId::new(u)).unwrap())
            .collect();
        assert_eq!(colors, vec![Color::Red, Color::Blue, Color::Green, Color::Yellow]);
        assert!(state.is_full());
        assert_eq!(state.seat(UserId::new("e")), None);
    }

    #[test]
    fn test_two_seat_order_is_diagonal() {
        assert_eq!(SeatCount::Two.turn_order(), vec![Color::Red, Color::Green]);
        assert_eq!(SeatCount::from_seats(4), Some(SeatCount::Four));
        assert_eq!(SeatCount::from_seats(3), None);
    }

    #[test]
    fn test_waiting_state_passes_invariants() {
        let mut state = waiting(SeatCount::Two);
        state.seat(UserId::new("a"));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_invariants_catch_inactive_color_on_ring() {
        let mut state = waiting(SeatCount::Two);
        state.board.place(Color::Blue, 0, Position::OnRing(5));
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_catch_pending_die_while_waiting() {
        let mut state = waiting(SeatCount::Two);
        state.pending_dice = Some(3);
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_catch_winner_with_unfinished_tokens() {
        let mut state = waiting(SeatCount::Two);
        state.seat(UserId::new("a"));
        state.seat(UserId::new("b"));
        state.status = MatchStatus::Completed;
        state.winner = Some(Color::Red);
        assert!(state.check_invariants().is_err());
    }
}
