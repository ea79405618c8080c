//! Client-side board mirror with move prediction.
//!
//! A client may show a move before the server confirms it, but the local
//! board is only ever a guess. [`BoardMirror`] keeps two boards apart:
//!
//! - the **confirmed** board, built purely from server events;
//! - an optional **prediction**: the confirmed board plus one locally
//!   applied move, checked with the same [`MoveValidator`] the server runs.
//!
//! When the matching `token_moved` arrives the prediction is dropped and the
//! confirmed board takes over; an `error` rolls it back.

use ludo_engine::{
    Board, Capture, Color, MoveOutcome, MoveValidator, Position, RuleViolation, TrackTopology,
};

use crate::{MatchSnapshot, ProtocolError, ServerMessage, decode_position};

/// What [`BoardMirror::apply`] did with a server event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// The event matched the outstanding prediction.
    Confirmed,
    /// The server applied something other than what was predicted.
    Corrected,
    /// The prediction was rejected and discarded.
    RolledBack,
    /// The confirmed board changed with no prediction outstanding.
    Applied,
    /// The event does not touch the board.
    Ignored,
}

#[derive(Debug, Clone)]
struct Prediction {
    outcome: MoveOutcome,
    board: Board,
}

/// One client's view of a match.
#[derive(Debug, Clone)]
pub struct BoardMirror {
    validator: MoveValidator<'static>,
    confirmed: Board,
    prediction: Option<Prediction>,
    current_turn: Option<Color>,
    last_roll: Option<u8>,
}

impl BoardMirror {
    /// Starts mirroring from a `game_joined` snapshot.
    ///
    /// # Errors
    /// Fails if the snapshot carries undecodable positions.
    pub fn from_snapshot(snapshot: &MatchSnapshot) -> Result<Self, ProtocolError> {
        Ok(Self {
            validator: MoveValidator::new(TrackTopology::standard(), snapshot.block_policy),
            confirmed: snapshot.board()?,
            prediction: None,
            current_turn: snapshot.current_turn_color,
            last_roll: snapshot.pending_dice,
        })
    }

    /// The board to render: the prediction if one is outstanding.
    pub fn board(&self) -> &Board {
        self.prediction
            .as_ref()
            .map_or(&self.confirmed, |p| &p.board)
    }

    /// The board as the server last reported it.
    pub fn confirmed(&self) -> &Board {
        &self.confirmed
    }

    pub fn is_predicting(&self) -> bool {
        self.prediction.is_some()
    }

    pub fn current_turn(&self) -> Option<Color> {
        self.current_turn
    }

    /// The last value rolled, kept until a move or a turn change uses it up.
    pub fn last_roll(&self) -> Option<u8> {
        self.last_roll
    }

    /// Applies `color`'s move of `token` locally, using the last roll.
    ///
    /// The confirmed board is untouched. A second prediction replaces the
    /// first.
    pub fn predict_move(&mut self, color: Color, token: usize) -> Result<MoveOutcome, RuleViolation> {
        if self.current_turn != Some(color) {
            return Err(RuleViolation::NotYourTurn(color));
        }
        let dice = self.last_roll.ok_or(RuleViolation::NoPendingRoll)?;
        let outcome = self.validator.check_move(&self.confirmed, color, token, dice)?;

        let mut board = self.confirmed.clone();
        apply_outcome(&mut board, &outcome);
        self.prediction = Some(Prediction { outcome, board });
        Ok(outcome)
    }

    /// Folds one authoritative event into the mirror.
    ///
    /// # Errors
    /// Fails if the event carries an undecodable position; the mirror is
    /// left unchanged in that case.
    pub fn apply(&mut self, event: &ServerMessage) -> Result<Reconcile, ProtocolError> {
        match event {
            ServerMessage::GameJoined { snapshot, .. } => {
                *self = Self::from_snapshot(snapshot)?;
                Ok(Reconcile::Applied)
            }
            ServerMessage::GameStarted {
                current_turn_color, ..
            } => {
                self.current_turn = Some(*current_turn_color);
                Ok(Reconcile::Ignored)
            }
            ServerMessage::DiceRolled {
                value,
                current_turn_color,
            } => {
                let passed = self.current_turn != Some(*current_turn_color);
                self.current_turn = Some(*current_turn_color);
                self.last_roll = (!passed).then_some(*value);
                Ok(Reconcile::Ignored)
            }
            ServerMessage::TurnPassed { current_turn_color } => {
                self.current_turn = Some(*current_turn_color);
                self.last_roll = None;
                Ok(self.roll_back())
            }
            ServerMessage::TokenMoved {
                color,
                token_index,
                new_position,
                captured_color,
                captured_token_index,
                current_turn_color,
            } => {
                let to = decode_position(*color, *new_position)?;
                let from = self
                    .confirmed
                    .position(*color, *token_index)
                    .ok_or_else(|| {
                        ProtocolError::InvalidMessage(format!("token index {token_index}"))
                    })?;
                let captured = match (captured_color, captured_token_index) {
                    (Some(c), Some(t)) => Some(Capture {
                        color: *c,
                        token: *t,
                    }),
                    _ => None,
                };
                let outcome = MoveOutcome {
                    color: *color,
                    token: *token_index,
                    from,
                    to,
                    captured,
                };

                apply_outcome(&mut self.confirmed, &outcome);
                self.current_turn = *current_turn_color;
                self.last_roll = None;

                Ok(match self.prediction.take() {
                    Some(p) if p.outcome == outcome => Reconcile::Confirmed,
                    Some(_) => Reconcile::Corrected,
                    None => Reconcile::Applied,
                })
            }
            ServerMessage::Error { .. } => Ok(self.roll_back()),
            ServerMessage::GameEnded { .. } | ServerMessage::GameCancelled { .. } => {
                self.current_turn = None;
                self.last_roll = None;
                Ok(self.roll_back())
            }
            _ => Ok(Reconcile::Ignored),
        }
    }

    fn roll_back(&mut self) -> Reconcile {
        match self.prediction.take() {
            Some(_) => Reconcile::RolledBack,
            None => Reconcile::Ignored,
        }
    }
}

fn apply_outcome(board: &mut Board, outcome: &MoveOutcome) {
    board.place(outcome.color, outcome.token, outcome.to);
    if let Some(captured) = outcome.captured {
        board.place(captured.color, captured.token, Position::AtHome);
    }
}
