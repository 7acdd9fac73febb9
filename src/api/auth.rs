//! Authentication endpoints.
//!
//! - POST `/login` - Verify credentials and start a session
//! - POST `/refresh` - Exchange a refresh token for a new token pair
//! - POST `/signout` - Revoke the presented refresh token and clear cookies
//! - GET `/me` - Profile of the authenticated user
//! - POST `/register` - Create a user in the caller's tenant

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{ApiError, ResultExt, WriteResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, OptionalAuth, REFRESH_COOKIE_NAME, REFRESH_TOKEN_SOURCES,
    clear_cookie, extract_token, session_cookie,
};
use crate::db::{Database, NewUser, User};
use crate::impl_has_auth_backend;
use crate::jwt::{
    ACCESS_TOKEN_DURATION_SECS, Identity, JwtConfig, REFRESH_TOKEN_DURATION_SECS, RefreshToken,
};
use crate::password::{hash_password, verify_dummy, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};
use crate::session::{SessionManager, TokenPair};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const DEFAULT_ROLE: &str = "user";
const ADMIN_ROLE: &str = "admin";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub sessions: SessionManager,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let session_router = Router::new()
        .route("/refresh", post(refresh))
        .route("/signout", post(signout))
        .route("/me", get(me))
        .route("/register", post(register))
        .with_state(state);

    Router::new().merge(login_router).merge(session_router)
}

/// Both session cookies for a freshly issued pair.
fn session_cookies(pair: &TokenPair, secure: bool) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE_NAME,
                pair.access_token.as_str(),
                ACCESS_TOKEN_DURATION_SECS,
                secure,
            ),
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE_NAME,
                pair.refresh_token.as_str(),
                REFRESH_TOKEN_DURATION_SECS,
                secure,
            ),
        ),
    ])
}

fn cleared_cookies(secure: bool) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, secure)),
        (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, secure)),
    ])
}

/// Trimmed, non-empty value or None.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Claims for a verified user record. Role and tenant always come from the
/// database row.
fn identity_of(user: &User) -> Identity {
    Identity {
        id: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        tenant_id: user.tenant_id.clone(),
    }
}

#[derive(Deserialize, Default)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserSummary {
    email: String,
    name: String,
    role: String,
    tenant_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: UserSummary,
    access_token: String,
    refresh_token: String,
}

/// Check a password off the async runtime. Unknown users still cost one
/// verification against the dummy hash.
async fn check_password(password: String, hash: Option<String>) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            verify_dummy(&password);
            Ok(false)
        }
    })
    .await
    .internal_err("Password verification task failed")?
    .internal_err("Failed to verify password")
}

async fn login(State(state): State<AuthState>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let payload: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();

    let (Some(email), Some(password)) = (non_empty(payload.email), payload.password) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };
    if password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = state
        .db
        .users()
        .get_active_by_email(&email)
        .await
        .db_err("Failed to look up user")?;

    let hash = user.as_ref().map(|u| u.password_hash.clone());
    if !check_password(password, hash).await? {
        debug!(email = %email, "Login rejected");
        return Err(ApiError::bad_request(INVALID_CREDENTIALS));
    }

    // check_password only returns true for a real hash
    let Some(user) = user else {
        return Err(ApiError::bad_request(INVALID_CREDENTIALS));
    };

    let pair = state
        .sessions
        .issue(&identity_of(&user))
        .await
        .internal_err("Failed to issue session")?;

    info!(user_id = %user.id, tenant_id = %user.tenant_id, "User logged in");

    Ok((
        StatusCode::OK,
        session_cookies(&pair, state.secure_cookies),
        Json(LoginResponse {
            user: UserSummary {
                email: user.email,
                name: user.name,
                role: user.role,
                tenant_id: user.tenant_id,
            },
            access_token: pair.access_token.as_str().to_string(),
            refresh_token: pair.refresh_token.as_str().to_string(),
        }),
    ))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
}

/// Refresh token from the cookie, falling back to `{"refreshToken": ...}` in
/// the body.
fn presented_refresh_token(headers: &HeaderMap, body: &[u8]) -> Option<RefreshToken> {
    if let Some(raw) = extract_token(headers, REFRESH_TOKEN_SOURCES) {
        return Some(RefreshToken::from_raw(raw));
    }
    let payload: RefreshRequest = serde_json::from_slice(body).unwrap_or_default();
    non_empty(payload.refresh_token).map(RefreshToken::from_raw)
}

async fn refresh(
    State(state): State<AuthState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let presented = presented_refresh_token(&headers, &body);

    let pair = state
        .sessions
        .refresh(presented.as_ref())
        .await
        .map_err(|e| ApiError::from_session(e, state.secure_cookies))?;

    Ok((
        StatusCode::OK,
        session_cookies(&pair, state.secure_cookies),
        Json(TokenPairResponse {
            access_token: pair.access_token.as_str().to_string(),
            refresh_token: pair.refresh_token.as_str().to_string(),
        }),
    ))
}

/// Logout always succeeds. The presented refresh token is revoked; without
/// one, a valid access token revokes the user's session instead.
async fn signout(
    State(state): State<AuthState>,
    OptionalAuth(auth): OptionalAuth,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let revoked = match (presented_refresh_token(&headers, &body), auth) {
        (Some(token), _) => state.sessions.revoke(&token).await,
        (None, Some(user)) => state.sessions.revoke_user(user.user_id()).await,
        (None, None) => Ok(false),
    };

    match revoked {
        Ok(revoked) => debug!(revoked, "Signed out"),
        Err(e) => warn!(error = %e, "Failed to revoke session on signout"),
    }

    (
        StatusCode::OK,
        cleared_cookies(state.secure_cookies),
        Json(serde_json::json!({ "message": "Logged out" })),
    )
}

#[derive(Serialize)]
struct TenantName {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    id: String,
    email: String,
    name: String,
    created_at: String,
    role: String,
    tenant_id: String,
    tenant: Option<TenantName>,
}

#[derive(Serialize)]
struct ProfileResponse {
    user: Profile,
}

async fn me(
    State(state): State<AuthState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(auth.user_id())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let tenant = state
        .db
        .tenants()
        .get_by_id(&user.tenant_id)
        .await
        .db_err("Failed to get tenant")?;

    Ok(Json(ProfileResponse {
        user: Profile {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
            role: user.role,
            tenant_id: user.tenant_id,
            tenant: tenant.map(|t| TenantName { name: t.name }),
        },
    }))
}

#[derive(Deserialize, Default)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    role: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredUser {
    id: String,
    email: String,
    name: String,
    role: String,
    tenant_id: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: RegisteredUser,
}

/// Create a user in the caller's tenant. A `tenantId` in the body is ignored.
async fn register(
    State(state): State<AuthState>,
    Auth(auth): Auth,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: RegisterRequest = serde_json::from_slice(&body).unwrap_or_default();

    let (Some(email), Some(password), Some(name)) = (
        non_empty(payload.email),
        payload.password.filter(|p| !p.is_empty()),
        non_empty(payload.name),
    ) else {
        return Err(ApiError::bad_request("Email, password and name are required"));
    };

    let role = non_empty(payload.role).unwrap_or_else(|| DEFAULT_ROLE.to_string());
    if role == ADMIN_ROLE && auth.identity.role != ADMIN_ROLE {
        return Err(ApiError::forbidden("Only admins can create admin users"));
    }

    if state
        .db
        .users()
        .email_exists(&email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .internal_err("Password hashing task failed")?
        .internal_err("Failed to hash password")?;

    let tenant_id = auth.tenant_id();
    let id = state
        .db
        .users()
        .create(NewUser {
            tenant_id,
            email: &email,
            name: &name,
            password_hash: &password_hash,
            role: &role,
        })
        .await
        .conflict_or_db_err("Email already registered", "Failed to create user")?;

    info!(user_id = %id, tenant_id = %tenant_id, created_by = %auth.user_id(), "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: RegisteredUser {
                id,
                email,
                name,
                role,
                tenant_id: tenant_id.to_string(),
            },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_takes_precedence_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", "refreshToken=from-cookie".parse().unwrap());

        let token = presented_refresh_token(&headers, br#"{"refreshToken":"from-body"}"#).unwrap();
        assert_eq!(token.as_str(), "from-cookie");
    }

    #[test]
    fn test_body_used_without_cookie() {
        let token =
            presented_refresh_token(&HeaderMap::new(), br#"{"refreshToken":"from-body"}"#).unwrap();
        assert_eq!(token.as_str(), "from-body");
    }

    #[test]
    fn test_no_token_anywhere() {
        assert!(presented_refresh_token(&HeaderMap::new(), b"").is_none());
        assert!(presented_refresh_token(&HeaderMap::new(), br#"{"refreshToken":"  "}"#).is_none());
    }
}
