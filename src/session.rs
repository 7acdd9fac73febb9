//! Session lifecycle: issuing token pairs, refresh rotation and revocation.
//!
//! The refresh record in the [`RefreshTokenStore`] is the only server-side
//! session state. Issuing a pair overwrites the user's record, refreshing
//! swaps the presented token for a new one, and a token that has been
//! swapped out can never be used again.

use std::sync::Arc;

use tracing::{error, warn};

use crate::db::RefreshTokenStore;
use crate::jwt::{AccessToken, Identity, JwtConfig, JwtError, RefreshToken, now_unix};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    /// Expiry of the refresh record (Unix seconds)
    pub refresh_expires_at: u64,
}

/// Errors from session operations.
#[derive(Debug)]
pub enum SessionError {
    /// No refresh token in cookie or body
    MissingRefreshToken,
    /// Token unknown to the store, already rotated out, or past its expiry
    SessionExpired,
    /// Stored token whose signature or claims do not check out
    InvalidRefreshToken,
    Token(JwtError),
    Store(sqlx::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::MissingRefreshToken => write!(f, "Refresh token is required"),
            SessionError::SessionExpired => write!(f, "Session expired"),
            SessionError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            SessionError::Token(e) => write!(f, "Token error: {}", e),
            SessionError::Store(e) => write!(f, "Token store error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Store(e)
    }
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        SessionError::Token(e)
    }
}

/// Issues, rotates and revokes sessions against a refresh token store.
#[derive(Clone)]
pub struct SessionManager {
    jwt: Arc<JwtConfig>,
    store: Arc<dyn RefreshTokenStore>,
}

impl SessionManager {
    pub fn new(jwt: Arc<JwtConfig>, store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { jwt, store }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    fn mint(&self, identity: &Identity) -> Result<TokenPair, SessionError> {
        let access_token = self.jwt.generate_access_token(identity)?;
        let refresh = self.jwt.generate_refresh_token(identity)?;
        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Sign a new pair for `identity` and make its refresh token the user's
    /// only live one.
    pub async fn issue(&self, identity: &Identity) -> Result<TokenPair, SessionError> {
        let pair = self.mint(identity)?;
        self.store
            .upsert(
                &identity.id,
                pair.refresh_token.as_str(),
                pair.refresh_expires_at as i64,
            )
            .await?;
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The presented token must be in the store, unexpired, and carry a valid
    /// signature. The swap is a compare-and-set on the old token, so of two
    /// concurrent refreshes with the same token only one succeeds.
    pub async fn refresh(&self, presented: Option<&RefreshToken>) -> Result<TokenPair, SessionError> {
        let presented = presented.ok_or(SessionError::MissingRefreshToken)?;
        let now = now_unix()? as i64;

        let Some(stored) = self.store.find_by_token(presented.as_str()).await? else {
            // Never issued, or replayed after rotation.
            warn!("Refresh attempted with unknown token");
            return Err(SessionError::SessionExpired);
        };

        if stored.is_expired(now) {
            self.store.delete_by_token(presented.as_str()).await?;
            return Err(SessionError::SessionExpired);
        }

        let claims = self
            .jwt
            .validate_refresh_token(presented)
            .map_err(|e| {
                warn!(user_id = %stored.user_id, error = %e, "Stored refresh token failed verification");
                SessionError::InvalidRefreshToken
            })?;

        if claims.identity.id != stored.user_id {
            error!(user_id = %stored.user_id, "Refresh token subject does not match its record");
            return Err(SessionError::InvalidRefreshToken);
        }

        let identity = claims.into_identity();
        let pair = self.mint(&identity)?;

        let rotated = self
            .store
            .rotate(
                &stored.user_id,
                presented.as_str(),
                pair.refresh_token.as_str(),
                pair.refresh_expires_at as i64,
            )
            .await?;

        if !rotated {
            warn!(user_id = %stored.user_id, "Lost refresh race, token already rotated");
            return Err(SessionError::SessionExpired);
        }

        // No-op after a successful rotate; kept so the old value can never
        // linger under another row.
        self.store.delete_by_token(presented.as_str()).await?;

        Ok(pair)
    }

    /// Revoke the session holding this refresh token, if any.
    pub async fn revoke(&self, token: &RefreshToken) -> Result<bool, SessionError> {
        Ok(self.store.delete_by_token(token.as_str()).await? > 0)
    }

    /// Revoke whatever session the user currently holds.
    pub async fn revoke_user(&self, user_id: &str) -> Result<bool, SessionError> {
        Ok(self.store.delete_by_user(user_id).await? > 0)
    }
}
