//! Unified error type for the Ludo server.

use ludo_protocol::ProtocolError;
use ludo_room::RoomError;
use ludo_session::SessionError;
use ludo_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert layer errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum LudoError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, resume, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, rule violation).
    #[error(transparent)]
    Room(#[from] RoomError),
}
