//! Colors, token positions, and the board that holds them.
//!
//! The board stores nothing but positions. Which tokens sit on a given ring
//! cell is computed on demand by [`Board::occupants`] rather than kept in a
//! second, redundant structure that could drift out of sync.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::topology::{HOME_STRETCH_LENGTH, RING_LENGTH};

/// Every color owns exactly this many tokens.
pub const TOKENS_PER_COLOR: usize = 4;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// One of the four board colors.
///
/// The declaration order is the palette order used for array indexing and
/// for the per-color wire ranges (red = 1xx, green = 2xx, blue = 3xx,
/// yellow = 4xx). It is NOT the turn order; see
/// [`SeatCount::turn_order`](crate::SeatCount::turn_order).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    /// All colors in palette order.
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];

    /// Position of this color in the palette (0..4).
    pub fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Yellow => 3,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Where a single token is.
///
/// These four variants are the only internal encoding. The integer form
/// clients see lives in `ludo-protocol` and is derived from this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Not yet entered the ring.
    AtHome,
    /// Absolute ring cell in `1..=52`, shared by all colors.
    OnRing(u8),
    /// Step in `1..=5` of the token's private home stretch. Step 6 is
    /// [`Position::Finished`].
    OnHomeStretch(u8),
    /// Reached the end of the home stretch. Never moves again.
    Finished,
}

impl Position {
    pub fn is_home(self) -> bool {
        matches!(self, Self::AtHome)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// The ring cell, if the token is on the shared ring.
    pub fn ring_cell(self) -> Option<u8> {
        match self {
            Self::OnRing(cell) => Some(cell),
            _ => None,
        }
    }

    /// Whether the payload of this position is inside its valid range.
    pub fn is_well_formed(self) -> bool {
        match self {
            Self::AtHome | Self::Finished => true,
            Self::OnRing(cell) => (1..=RING_LENGTH).contains(&cell),
            Self::OnHomeStretch(step) => (1..HOME_STRETCH_LENGTH).contains(&step),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtHome => write!(f, "home"),
            Self::OnRing(cell) => write!(f, "ring:{cell}"),
            Self::OnHomeStretch(step) => write!(f, "stretch:{step}"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Token positions for all four palette colors.
///
/// Inactive colors (not seated in this match) simply keep their tokens at
/// home, so they never show up in ring occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    tokens: [[Position; TOKENS_PER_COLOR]; 4],
}

impl Board {
    /// A board with every token at home.
    pub fn new() -> Self {
        Self {
            tokens: [[Position::AtHome; TOKENS_PER_COLOR]; 4],
        }
    }

    /// The four token positions of `color`.
    pub fn tokens(&self, color: Color) -> &[Position; TOKENS_PER_COLOR] {
        &self.tokens[color.index()]
    }

    /// Position of one token, or `None` if `token` is out of range.
    pub fn position(&self, color: Color, token: usize) -> Option<Position> {
        self.tokens[color.index()].get(token).copied()
    }

    /// Overwrites one token's position. Out-of-range indices are ignored;
    /// callers validate indices before mutating.
    pub fn place(&mut self, color: Color, token: usize, position: Position) {
        if let Some(slot) = self.tokens[color.index()].get_mut(token) {
            *slot = position;
        }
    }

    /// Every `(color, token)` currently standing on ring `cell`.
    pub fn occupants(&self, cell: u8) -> impl Iterator<Item = (Color, usize)> + '_ {
        Color::ALL.into_iter().flat_map(move |color| {
            self.tokens[color.index()]
                .iter()
                .enumerate()
                .filter(move |(_, pos)| pos.ring_cell() == Some(cell))
                .map(move |(token, _)| (color, token))
        })
    }

    /// Number of `color`'s tokens standing on ring `cell`.
    pub fn count_on(&self, color: Color, cell: u8) -> usize {
        self.tokens(color)
            .iter()
            .filter(|pos| pos.ring_cell() == Some(cell))
            .count()
    }

    /// `true` once all four of `color`'s tokens are finished.
    pub fn all_finished(&self, color: Color) -> bool {
        self.tokens(color).iter().all(|pos| pos.is_finished())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
