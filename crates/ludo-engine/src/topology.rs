//! Static board geometry.
//!
//! The ring is a 52-cell loop shared by every color. Each color enters the
//! ring on its own entry cell, travels one lap, and peels off into a private
//! six-step home stretch just before returning to its entry. Safe cells
//! (entries and stars) forbid captures.
//!
//! ```text
//!            entry   peel-off
//!   red        1       51
//!   blue      14       12
//!   green     27       25
//!   yellow    40       38
//!   stars: 9, 22, 35, 48
//! ```
//!
//! Red and green sit diagonally opposite, which is the two-seat layout.

use crate::Color;

/// Number of cells on the shared ring.
pub const RING_LENGTH: u8 = 52;

/// Steps in a home stretch. Reaching this step means the token finished.
pub const HOME_STRETCH_LENGTH: u8 = 6;

/// Entry cells in palette order (red, green, blue, yellow).
const ENTRY_CELLS: [u8; 4] = [1, 27, 14, 40];

/// Star cells: safe cells that are not entry cells.
const STAR_CELLS: [u8; 4] = [9, 22, 35, 48];

static STANDARD: TrackTopology = TrackTopology::build(ENTRY_CELLS, STAR_CELLS);

/// Immutable lookup table for one board size.
///
/// Built once at compile time and shared by every match through
/// [`TrackTopology::standard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTopology {
    entry: [u8; 4],
    peel_off: [u8; 4],
    /// Bit `n` set ⇔ ring cell `n` is safe.
    safe_mask: u64,
}

impl TrackTopology {
    const fn build(entry: [u8; 4], stars: [u8; 4]) -> Self {
        let mut peel_off = [0u8; 4];
        let mut safe_mask = 0u64;
        let mut i = 0;
        while i < 4 {
            peel_off[i] = wrap_cell(entry[i] as i16 - 2);
            safe_mask |= 1u64 << entry[i];
            safe_mask |= 1u64 << stars[i];
            i += 1;
        }
        Self {
            entry,
            peel_off,
            safe_mask,
        }
    }

    /// The standard 52-cell, four-color board.
    pub fn standard() -> &'static TrackTopology {
        &STANDARD
    }

    pub fn ring_length(&self) -> u8 {
        RING_LENGTH
    }

    /// The ring cell a token of `color` lands on when it leaves home.
    pub fn entry_offset(&self, color: Color) -> u8 {
        self.entry[color.index()]
    }

    /// The last ring cell `color` visits before its home stretch.
    pub fn peel_off_cell(&self, color: Color) -> u8 {
        self.peel_off[color.index()]
    }

    pub fn is_safe_cell(&self, cell: u8) -> bool {
        cell >= 1 && cell <= RING_LENGTH && self.safe_mask & (1u64 << cell) != 0
    }

    /// The cell reached by walking `steps` forward from `cell`, wrapping.
    pub fn advance(&self, cell: u8, steps: u8) -> u8 {
        wrap_cell(cell as i16 + steps as i16)
    }

    /// How many forward steps separate `cell` from `color`'s peel-off cell.
    ///
    /// Zero when the token is standing on the peel-off cell itself.
    pub fn steps_to_peel_off(&self, color: Color, cell: u8) -> u8 {
        (self.peel_off_cell(color) as i16 - cell as i16).rem_euclid(RING_LENGTH as i16) as u8
    }

    /// Cells entered when walking `steps` forward from `cell`, in order,
    /// ending with the destination.
    pub fn path(&self, cell: u8, steps: u8) -> impl Iterator<Item = u8> + '_ {
        (1..=steps).map(move |s| self.advance(cell, s))
    }
}

/// Maps any integer onto the 1-based ring.
const fn wrap_cell(raw: i16) -> u8 {
    ((raw - 1).rem_euclid(RING_LENGTH as i16) + 1) as u8
}
