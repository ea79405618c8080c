//! Error types for the session layer.

use ludo_engine::UserId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity service rejected the credential.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("session not found for {0}")]
    NotFound(UserId),

    /// The resume token is unknown or belongs to a replaced session.
    #[error("invalid resume token")]
    InvalidToken,

    /// The grace window elapsed before the user came back.
    #[error("session expired for {0}")]
    SessionExpired(UserId),

    /// One live connection per user.
    #[error("{0} already has an active session")]
    AlreadyConnected(UserId),
}
