//! Authentication hook.
//!
//! Identity is owned by an external service. The server only needs a way
//! to turn the credential a client presents into a [`PlayerIdentity`];
//! production deployments implement [`Authenticator`] against that
//! service.

use ludo_engine::UserId;

use crate::SessionError;

/// Who a connection belongs to, as asserted by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

impl PlayerIdentity {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
        }
    }
}

/// Validates a client credential.
///
/// # Example
///
/// ```rust
/// use ludo_engine::UserId;
/// use ludo_session::{Authenticator, PlayerIdentity, SessionError};
///
/// struct ApiKeyAuthenticator;
///
/// impl Authenticator for ApiKeyAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<PlayerIdentity, SessionError> {
///         let user = token
///             .strip_prefix("key-")
///             .ok_or_else(|| SessionError::AuthFailed("unknown key format".into()))?;
///         Ok(PlayerIdentity::new(UserId::new(user)))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Called once per handshake that carries a credential.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerIdentity, SessionError>> + Send;
}

/// Trusts the token as the user id. Local play and tests only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<PlayerIdentity, SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::AuthFailed("empty token".into()));
        }
        Ok(PlayerIdentity::new(UserId::new(token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_authenticator_uses_token_as_user_id() {
        let identity = DevAuthenticator.authenticate("alice").await.unwrap();
        assert_eq!(identity.user_id, UserId::new("alice"));
        assert_eq!(identity.display_name, None);
    }

    #[tokio::test]
    async fn test_dev_authenticator_rejects_blank_token() {
        let result = DevAuthenticator.authenticate("  ").await;
        assert!(matches!(result, Err(SessionError::AuthFailed(_))));
    }
}
