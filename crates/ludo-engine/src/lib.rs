//! Authoritative rules engine for Ludo Arena.
//!
//! Everything in this crate is synchronous and free of I/O. A room actor
//! owns one [`MatchState`] and feeds every validated command through the
//! [`TurnScheduler`], which in turn asks the [`MoveValidator`] whether a
//! token may move. The results are plain values that the caller turns into
//! wire events.
//!
//! ```text
//! TrackTopology (static)  ← geometry: ring, entries, safe cells, peel-offs
//!     ↑
//! MoveValidator           ← "where does this token land?" (pure)
//!     ↑
//! TurnScheduler           ← roll / move / timeout transitions
//!     ↑
//! MatchState              ← the only mutable data, owned by a room actor
//! ```
//!
//! # Key types
//!
//! - [`TrackTopology`] — immutable board geometry shared by all matches
//! - [`Board`] — token positions for every color; occupancy is derived
//! - [`MoveValidator`] — computes destinations, captures and rejections
//! - [`TurnScheduler`] — the turn state machine
//! - [`MatchState`] — per-room players, board, turn pointer and status

mod board;
mod error;
mod ids;
mod scheduler;
mod state;
mod topology;
mod validator;

pub use board::{Board, Color, Position, TOKENS_PER_COLOR};
pub use error::{InvariantViolation, RuleViolation};
pub use ids::{RoomCode, UserId};
pub use scheduler::{MoveResult, RollOutcome, RollResult, TurnPassed, TurnScheduler};
pub use state::{
    ConnectionState, MatchState, MatchStatus, Player, SeatCount, TurnPhase,
};
pub use topology::{HOME_STRETCH_LENGTH, RING_LENGTH, TrackTopology};
pub use validator::{BlockPolicy, Capture, MoveOutcome, MoveValidator};
