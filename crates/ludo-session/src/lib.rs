//! Player sessions for Ludo Arena.
//!
//! 1. **Authentication**: who a player is, as told by the external
//!    identity service ([`Authenticator`]).
//! 2. **Session tracking**: which users are connected ([`SessionManager`]).
//! 3. **Resumption**: a dropped client may hand back its resume token
//!    within the grace window instead of authenticating again.
//!
//! Match seats are NOT tracked here. A session only remembers which room
//! its user last joined, so a resumed client can be told where to go back.

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{Authenticator, DevAuthenticator, PlayerIdentity};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
