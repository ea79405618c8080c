//! # Ludo Arena
//!
//! Authoritative online Ludo match server.
//!
//! Clients connect over WebSocket, authenticate once, then send gameplay
//! commands (`join_game`, `roll_dice`, `move_token`, `leave_game`) for a
//! room code. Every room runs as its own actor task that validates
//! each command against the rules and broadcasts the resulting events to
//! everyone seated, in order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ludo::prelude::*;
//!
//! struct LogSettlement;
//!
//! impl SettlementHook for LogSettlement {
//!     async fn settle(&self, outcome: MatchOutcome) -> Result<(), SettlementError> {
//!         println!("{} won {}", outcome.winner, outcome.room_code);
//!         Ok(())
//!     }
//! }
//!
//! # async fn start() -> Result<(), LudoError> {
//! let server = LudoServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(DevAuthenticator, LogSettlement)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::LudoError;
pub use server::{LudoServer, LudoServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{LudoError, LudoServer, LudoServerBuilder};
    pub use ludo_engine::{BlockPolicy, Color, RoomCode, SeatCount, UserId};
    pub use ludo_protocol::{
        CancelReason, ClientMessage, Envelope, ErrorReason, PROTOCOL_VERSION, ServerMessage,
    };
    pub use ludo_room::{
        Dice, MatchConfig, MatchOutcome, RandomDice, RoomInfo, RoomRegistry, SettlementError,
        SettlementHook,
    };
    pub use ludo_session::{Authenticator, DevAuthenticator, PlayerIdentity, SessionConfig, SessionError};
}
