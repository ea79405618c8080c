//! Room lifecycle for Ludo Arena.
//!
//! Each match room runs as an isolated Tokio task (actor model) that owns
//! its [`MatchState`](ludo_engine::MatchState) and is the only code that
//! ever writes to it. Commands from connections and expiring timers are
//! fed through one `select!` loop, so they are applied strictly one at a
//! time and every resulting event is broadcast in that same order.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — creates rooms lazily by code, routes commands,
//!   reaps finished rooms
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`MatchConfig`] — seats, turn timeout, grace and retention windows
//! - [`Dice`] — where die values come from
//! - [`SettlementHook`] — called once per completed match

#![allow(async_fn_in_trait)]

mod config;
mod dice;
mod error;
mod registry;
mod room;
mod settlement;

pub use config::MatchConfig;
pub use dice::{Dice, RandomDice};
pub use error::RoomError;
pub use registry::{DiceFactory, RoomRegistry};
pub use room::{PlayerSender, RoomHandle, RoomInfo};
pub use settlement::{MatchOutcome, SettlementError, SettlementHook};
