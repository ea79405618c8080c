//! Move validation: where a token lands for a given die value.
//!
//! This is the single place that decides move legality. The turn scheduler
//! asks it twice per roll: once to see whether *any* token can move (the
//! auto-pass check) and once for the token the player actually picked.
//! Both paths go through [`MoveValidator::check_move`], so they cannot
//! disagree.
//!
//! Rules, applied in order:
//!
//! 1. A token at home enters on its color's entry cell, and only on a six.
//! 2. On the ring, a token walks `d` cells, but any steps past its
//!    peel-off cell turn into home-stretch steps.
//! 3. In the home stretch, landing exactly on step 6 finishes the token;
//!    overshooting is illegal for that token.
//! 4. Finished tokens never move.
//! 5. Landing alone next to exactly one opposing token on an unsafe cell
//!    captures it (sends it home). Teammates never capture each other.

use serde::{Deserialize, Serialize};

use crate::topology::HOME_STRETCH_LENGTH;
use crate::{Board, Color, Position, RuleViolation, TOKENS_PER_COLOR, TrackTopology};

/// How same-color stacks interact with opponents.
///
/// One value per match, applied to every token the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// Stacks never block anybody. Two or more opposing tokens on one
    /// cell are simply not capturable.
    #[default]
    Open,
    /// Two or more tokens of one color on a ring cell form a blockade:
    /// no other color may pass through or land on that cell.
    Blockade,
}

/// An opposing token sent home by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub color: Color,
    pub token: usize,
}

/// The computed effect of one legal move. Nothing is applied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub color: Color,
    pub token: usize,
    pub from: Position,
    pub to: Position,
    pub captured: Option<Capture>,
}

/// Pure move validator bound to one topology and one block policy.
#[derive(Debug, Clone, Copy)]
pub struct MoveValidator<'a> {
    topology: &'a TrackTopology,
    policy: BlockPolicy,
}

impl<'a> MoveValidator<'a> {
    pub fn new(topology: &'a TrackTopology, policy: BlockPolicy) -> Self {
        Self { topology, policy }
    }

    pub fn topology(&self) -> &'a TrackTopology {
        self.topology
    }

    pub fn policy(&self) -> BlockPolicy {
        self.policy
    }

    /// Geometry only: the destination of a token of `color` standing on
    /// `from` after rolling `dice`, ignoring every other token.
    pub fn destination(
        &self,
        color: Color,
        from: Position,
        dice: u8,
    ) -> Result<Position, RuleViolation> {
        if !(1..=6).contains(&dice) {
            return Err(RuleViolation::IllegalDestination);
        }
        match from {
            Position::Finished => Err(RuleViolation::TokenAlreadyFinished),
            Position::AtHome if dice == 6 => {
                Ok(Position::OnRing(self.topology.entry_offset(color)))
            }
            Position::AtHome => Err(RuleViolation::IllegalDestination),
            Position::OnRing(cell) => {
                let to_peel = self.topology.steps_to_peel_off(color, cell);
                if dice <= to_peel {
                    Ok(Position::OnRing(self.topology.advance(cell, dice)))
                } else {
                    stretch_step(dice - to_peel)
                }
            }
            Position::OnHomeStretch(step) => stretch_step(step + dice),
        }
    }

    /// Full check for moving `color`'s `token` by `dice` on `board`:
    /// geometry, blockades and captures.
    pub fn check_move(
        &self,
        board: &Board,
        color: Color,
        token: usize,
        dice: u8,
    ) -> Result<MoveOutcome, RuleViolation> {
        let from = board
            .position(color, token)
            .ok_or(RuleViolation::NoSuchToken(token))?;
        let to = self.destination(color, from, dice)?;

        if self.policy == BlockPolicy::Blockade && self.is_blocked(board, color, from, to, dice) {
            return Err(RuleViolation::IllegalDestination);
        }

        Ok(MoveOutcome {
            color,
            token,
            from,
            to,
            captured: self.capture_at(board, color, to),
        })
    }

    /// Indices of `color`'s tokens that have a legal move for `dice`.
    pub fn movable_tokens(&self, board: &Board, color: Color, dice: u8) -> Vec<usize> {
        (0..TOKENS_PER_COLOR)
            .filter(|&token| self.check_move(board, color, token, dice).is_ok())
            .collect()
    }

    /// `true` if at least one of `color`'s tokens can move.
    pub fn has_legal_move(&self, board: &Board, color: Color, dice: u8) -> bool {
        (0..TOKENS_PER_COLOR).any(|token| self.check_move(board, color, token, dice).is_ok())
    }

    /// The opposing token captured by landing on `to`, if any.
    fn capture_at(&self, board: &Board, mover: Color, to: Position) -> Option<Capture> {
        let cell = to.ring_cell()?;
        if self.topology.is_safe_cell(cell) {
            return None;
        }
        let mut opponents = board.occupants(cell).filter(|(color, _)| *color != mover);
        let (color, token) = opponents.next()?;
        if opponents.next().is_some() {
            return None;
        }
        Some(Capture { color, token })
    }

    /// Whether a blockade stands on any ring cell the move enters.
    fn is_blocked(
        &self,
        board: &Board,
        mover: Color,
        from: Position,
        to: Position,
        dice: u8,
    ) -> bool {
        let blockade = |cell: u8| {
            Color::ALL
                .into_iter()
                .filter(|c| *c != mover)
                .any(|c| board.count_on(c, cell) >= 2)
        };
        match from {
            Position::AtHome => to.ring_cell().is_some_and(blockade),
            Position::OnRing(cell) => {
                let ring_steps = dice.min(self.topology.steps_to_peel_off(mover, cell));
                self.topology.path(cell, ring_steps).any(blockade)
            }
            Position::OnHomeStretch(_) | Position::Finished => false,
        }
    }
}

/// Converts a home-stretch step count into a position.
fn stretch_step(step: u8) -> Result<Position, RuleViolation> {
    match step {
        s if s < HOME_STRETCH_LENGTH => Ok(Position::OnHomeStretch(s)),
        s if s == HOME_STRETCH_LENGTH => Ok(Position::Finished),
        _ => Err(RuleViolation::IllegalDestination),
    }
}
