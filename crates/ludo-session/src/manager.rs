//! The session manager: every authenticated user the server knows about.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain `HashMap` wrapper. The server keeps it behind
//! one short-lived lock and never holds that lock across an await.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use ludo_engine::{RoomCode, UserId};
use rand::Rng;
use tracing::info;

use crate::{PlayerIdentity, Session, SessionConfig, SessionError, SessionState};

/// Tracks sessions by user id, with a resume-token index.
///
/// ```text
/// authenticate() ──→ create() ──→ disconnect() ──→ resume()
///                       │               │               │
///                       ▼               ▼               ▼
///                  [Connected]    [Disconnected]   [Connected]
///                                       │
///                                       ▼ expire_stale()
///                                   [Expired] ──→ cleanup_expired()
/// ```
#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<UserId, Session>,
    /// Resume token → owner. Kept in sync with `sessions`.
    tokens: HashMap<String, UserId>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            config,
        }
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.reconnect_grace_secs)
    }

    /// Opens a session for a freshly authenticated user.
    ///
    /// A disconnected or expired session for the same user is replaced; its
    /// old resume token stops working, but the room it was in carries over.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the user is connected elsewhere.
    pub fn create(&mut self, identity: PlayerIdentity) -> Result<&Session, SessionError> {
        let user_id = identity.user_id.clone();
        let mut room = None;

        if let Some(existing) = self.sessions.get(&user_id) {
            if existing.is_connected() {
                return Err(SessionError::AlreadyConnected(user_id));
            }
            self.tokens.remove(&existing.resume_token);
            room = existing.room.clone();
        }

        let token = generate_token();
        self.tokens.insert(token.clone(), user_id.clone());
        let session = Session {
            identity,
            state: SessionState::Connected,
            resume_token: token,
            room,
        };

        info!(%user_id, "session created");

        Ok(match self.sessions.entry(user_id) {
            Entry::Occupied(mut slot) => {
                slot.insert(session);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(session),
        })
    }

    /// Marks a user's connection as lost and starts the grace window.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the user has no session.
    pub fn disconnect(&mut self, user_id: &UserId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(user_id)
            .ok_or_else(|| SessionError::NotFound(user_id.clone()))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };

        info!(%user_id, "session disconnected, grace period started");
        Ok(())
    }

    /// Brings a disconnected session back with its resume token.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: token not recognised
    /// - [`SessionError::SessionExpired`]: grace window elapsed
    /// - [`SessionError::AlreadyConnected`]: the session is live elsewhere
    pub fn resume(&mut self, token: &str) -> Result<&Session, SessionError> {
        let grace = self.grace();
        let user_id = self
            .tokens
            .get(token)
            .cloned()
            .ok_or(SessionError::InvalidToken)?;
        let session = self
            .sessions
            .get_mut(&user_id)
            .ok_or(SessionError::InvalidToken)?;

        match session.state {
            SessionState::Disconnected { since } if since.elapsed() >= grace => {
                session.state = SessionState::Expired;
                Err(SessionError::SessionExpired(user_id))
            }
            SessionState::Disconnected { .. } => {
                session.state = SessionState::Connected;
                info!(%user_id, "session resumed");
                Ok(session)
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(user_id)),
            SessionState::Expired => Err(SessionError::SessionExpired(user_id)),
        }
    }

    /// Records the room `user_id` is seated in (`None` after leaving).
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the user has no session.
    pub fn set_room(&mut self, user_id: &UserId, room: Option<RoomCode>) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(user_id)
            .ok_or_else(|| SessionError::NotFound(user_id.clone()))?;
        session.room = room;
        Ok(())
    }

    /// Expires every disconnected session whose grace window has elapsed.
    ///
    /// Returns the expired users. Their data stays until
    /// [`cleanup_expired`](Self::cleanup_expired).
    pub fn expire_stale(&mut self) -> Vec<UserId> {
        let grace = self.grace();
        let mut expired = Vec::new();

        for (user_id, session) in &mut self.sessions {
            if let SessionState::Disconnected { since } = session.state {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    info!(%user_id, "session expired (grace period elapsed)");
                    expired.push(user_id.clone());
                }
            }
        }

        expired
    }

    /// Drops expired sessions and their resume tokens.
    pub fn cleanup_expired(&mut self) {
        let tokens = &mut self.tokens;
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                tokens.remove(&session.resume_token);
                false
            } else {
                true
            }
        });
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 128 random bits as 32 lowercase hex characters.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Grace windows are either 0 s (expire on the spot) or an hour (never
    //! expire during a test), which keeps these tests free of sleeps.

    use super::*;

    fn manager_with_instant_expiry() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 0,
        })
    }

    fn manager_with_long_grace() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 3600,
        })
    }

    fn uid(id: &str) -> UserId {
        UserId::new(id)
    }

    fn who(id: &str) -> PlayerIdentity {
        PlayerIdentity::new(uid(id))
    }

    // =====================================================================
    // create()
    // =====================================================================

    #[test]
    fn test_create_new_user_returns_connected_session() {
        let mut mgr = manager_with_long_grace();
        let session = mgr.create(who("alice")).unwrap();

        assert!(session.is_connected());
        assert_eq!(session.identity.user_id, uid("alice"));
        assert_eq!(session.resume_token.len(), 32);
        assert!(session.resume_token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(session.room, None);
    }

    #[test]
    fn test_create_each_user_gets_unique_token() {
        let mut mgr = manager_with_long_grace();
        let t1 = mgr.create(who("a")).unwrap().resume_token.clone();
        let t2 = mgr.create(who("b")).unwrap().resume_token.clone();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_create_already_connected_returns_error() {
        let mut mgr = manager_with_long_grace();
        mgr.create(who("alice")).unwrap();

        let result = mgr.create(who("alice"));
        assert!(matches!(result, Err(SessionError::AlreadyConnected(u)) if u == uid("alice")));
    }

    #[test]
    fn test_create_replaces_disconnected_session_and_keeps_room() {
        let mut mgr = manager_with_long_grace();
        let old_token = mgr.create(who("alice")).unwrap().resume_token.clone();
        mgr.set_room(&uid("alice"), Some(RoomCode::new("ROOM"))).unwrap();
        mgr.disconnect(&uid("alice")).unwrap();

        let session = mgr.create(who("alice")).unwrap();
        assert!(session.is_connected());
        assert_eq!(session.room, Some(RoomCode::new("ROOM")));
        assert_ne!(session.resume_token, old_token);

        assert!(matches!(mgr.resume(&old_token), Err(SessionError::InvalidToken)));
        assert_eq!(mgr.len(), 1);
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_keeps_token_and_marks_state() {
        let mut mgr = manager_with_long_grace();
        let token = mgr.create(who("alice")).unwrap().resume_token.clone();

        mgr.disconnect(&uid("alice")).unwrap();

        let session = mgr.get(&uid("alice")).unwrap();
        assert!(matches!(session.state, SessionState::Disconnected { .. }));
        assert_eq!(session.resume_token, token);
    }

    #[test]
    fn test_disconnect_unknown_user_returns_not_found() {
        let mut mgr = manager_with_long_grace();
        let result = mgr.disconnect(&uid("ghost"));
        assert!(matches!(result, Err(SessionError::NotFound(u)) if u == uid("ghost")));
    }

    // =====================================================================
    // resume()
    // =====================================================================

    #[test]
    fn test_resume_valid_token_restores_connected() {
        let mut mgr = manager_with_long_grace();
        let token = mgr.create(who("alice")).unwrap().resume_token.clone();
        mgr.set_room(&uid("alice"), Some(RoomCode::new("R1"))).unwrap();
        mgr.disconnect(&uid("alice")).unwrap();

        let session = mgr.resume(&token).unwrap();
        assert!(session.is_connected());
        assert_eq!(session.identity.user_id, uid("alice"));
        assert_eq!(session.room, Some(RoomCode::new("R1")));
    }

    #[test]
    fn test_resume_unknown_token_returns_invalid() {
        let mut mgr = manager_with_long_grace();
        mgr.create(who("alice")).unwrap();
        assert!(matches!(mgr.resume("nope"), Err(SessionError::InvalidToken)));
    }

    #[test]
    fn test_resume_after_grace_returns_expired() {
        let mut mgr = manager_with_instant_expiry();
        let token = mgr.create(who("alice")).unwrap().resume_token.clone();
        mgr.disconnect(&uid("alice")).unwrap();

        let result = mgr.resume(&token);
        assert!(matches!(result, Err(SessionError::SessionExpired(u)) if u == uid("alice")));
        assert!(matches!(
            mgr.get(&uid("alice")).unwrap().state,
            SessionState::Expired
        ));
    }

    #[test]
    fn test_resume_while_connected_returns_error() {
        let mut mgr = manager_with_long_grace();
        let token = mgr.create(who("alice")).unwrap().resume_token.clone();
        assert!(matches!(
            mgr.resume(&token),
            Err(SessionError::AlreadyConnected(_))
        ));
    }

    // =====================================================================
    // expire_stale() / cleanup_expired()
    // =====================================================================

    #[test]
    fn test_expire_stale_only_touches_disconnected() {
        let mut mgr = manager_with_instant_expiry();
        mgr.create(who("a")).unwrap();
        mgr.create(who("b")).unwrap();
        mgr.disconnect(&uid("a")).unwrap();

        assert_eq!(mgr.expire_stale(), vec![uid("a")]);
        assert!(mgr.get(&uid("b")).unwrap().is_connected());
    }

    #[test]
    fn test_expire_stale_long_grace_expires_nothing() {
        let mut mgr = manager_with_long_grace();
        mgr.create(who("a")).unwrap();
        mgr.disconnect(&uid("a")).unwrap();
        assert!(mgr.expire_stale().is_empty());
    }

    #[test]
    fn test_cleanup_removes_expired_and_their_tokens() {
        let mut mgr = manager_with_instant_expiry();
        let token = mgr.create(who("a")).unwrap().resume_token.clone();
        mgr.create(who("b")).unwrap();
        mgr.disconnect(&uid("a")).unwrap();
        mgr.expire_stale();

        mgr.cleanup_expired();

        assert_eq!(mgr.len(), 1);
        assert!(mgr.get(&uid("a")).is_none());
        assert!(matches!(mgr.resume(&token), Err(SessionError::InvalidToken)));
    }

    #[test]
    fn test_set_room_unknown_user_returns_not_found() {
        let mut mgr = manager_with_long_grace();
        assert!(mgr.set_room(&uid("x"), None).is_err());
        assert!(mgr.is_empty());
    }
}
