//! Error types for the protocol layer.

use ludo_engine::Color;

/// Errors that can occur while encoding, decoding or interpreting wire
/// messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, unknown
    /// message type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A wire position that no token of `color` can ever occupy.
    #[error("position {raw} is not valid for {color}")]
    InvalidPosition { color: Color, raw: i16 },

    /// The client speaks a protocol version this server does not.
    #[error("unsupported protocol version {got} (expected {expected})")]
    VersionMismatch { expected: u32, got: u32 },

    /// Passes deserialization but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
