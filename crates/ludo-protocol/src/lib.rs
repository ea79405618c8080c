//! Wire protocol for Ludo Arena.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`],
//!   [`ErrorReason`]) — the frames that travel on the wire.
//! - **Positions** ([`encode_position`], [`decode_position`]) — the
//!   bit-exact integer form of a token position.
//! - **Snapshots** ([`MatchSnapshot`]) — full state for (re)joining clients.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — bytes in, messages out.
//! - **Prediction** ([`BoardMirror`]) — a client-side board that may run
//!   ahead of the server and is reconciled against its events.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientMessage>) → Room actor
//! Room actor → Protocol (Envelope<ServerMessage>) → Transport (bytes)
//! ```

mod codec;
mod error;
mod mirror;
mod position;
mod snapshot;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use mirror::{BoardMirror, Reconcile};
pub use position::{WIRE_AT_HOME, decode_position, encode_position};
pub use snapshot::{ColorTokens, MatchSnapshot, SeatSnapshot};
pub use types::{
    CancelReason, ClientMessage, Envelope, ErrorReason, PROTOCOL_VERSION, ServerMessage,
};
