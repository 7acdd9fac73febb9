//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with two different secrets and are
//! carried around as distinct newtypes, so a refresh token can never reach
//! the access verifier (or the other way round) without an explicit
//! conversion.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Access token duration: 3 days
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 3 * 24 * 60 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// The claim set shared by both token kinds.
///
/// Once signed it never changes: a role or tenant change only shows up after
/// a new token pair is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
}

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims for access tokens (stateless).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(flatten)]
    pub identity: Identity,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID, makes every refresh token string unique
    pub jti: String,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

impl RefreshClaims {
    /// Drop the volatile fields (`jti`, `iat`, `exp`, `typ`) and keep the
    /// identity that seeds the next token pair.
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

/// A signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

/// A signed refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl AccessToken {
    /// Wrap a raw string received from a client.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RefreshToken {
    /// Wrap a raw string received from a client.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of generating a refresh token.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: RefreshToken,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Configuration for JWT operations.
pub struct JwtConfig {
    access: KeyPair,
    refresh: KeyPair,
}

/// Current Unix time in seconds.
pub fn now_unix() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

impl JwtConfig {
    /// Create a JWT configuration from the access and refresh secrets.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access: KeyPair::new(access_secret),
            refresh: KeyPair::new(refresh_secret),
        }
    }

    /// Sign an access token for the given identity.
    pub fn generate_access_token(&self, identity: &Identity) -> Result<AccessToken, JwtError> {
        let now = now_unix()?;

        let claims = AccessClaims {
            identity: identity.clone(),
            token_type: TokenType::Access,
            iat: now,
            exp: now + ACCESS_TOKEN_DURATION_SECS,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.access.encoding)
            .map(AccessToken)
            .map_err(JwtError::Encoding)
    }

    /// Sign a refresh token for the given identity.
    pub fn generate_refresh_token(
        &self,
        identity: &Identity,
    ) -> Result<IssuedRefreshToken, JwtError> {
        let now = now_unix()?;
        let exp = now + REFRESH_TOKEN_DURATION_SECS;

        let claims = RefreshClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            identity: identity.clone(),
            token_type: TokenType::Refresh,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh.encoding)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedRefreshToken {
            token: RefreshToken(token),
            expires_at: exp,
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &AccessToken) -> Result<AccessClaims, JwtError> {
        let token_data = jsonwebtoken::decode::<AccessClaims>(
            token.as_str(),
            &self.access.decoding,
            &validation(),
        )
        .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &RefreshToken) -> Result<RefreshClaims, JwtError> {
        let token_data = jsonwebtoken::decode::<RefreshClaims>(
            token.as_str(),
            &self.refresh.decoding,
            &validation(),
        )
        .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (bad signature, malformed, expired)
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
