//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::errors::AuthError;
use super::state::HasAuthBackend;
use super::token_source::{ACCESS_TOKEN_SOURCES, extract_token};
use super::types::AuthenticatedUser;
use crate::jwt::AccessToken;

/// Verify the access token carried by the request.
///
/// Purely cryptographic: the token store is never consulted, so an access
/// token stays valid until it expires.
pub fn authenticate<S: HasAuthBackend>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthError> {
    let raw = extract_token(&parts.headers, ACCESS_TOKEN_SOURCES)
        .ok_or(AuthError::NotAuthenticated)?;

    let claims = state
        .jwt()
        .validate_access_token(&AccessToken::from_raw(raw))
        .map_err(|e| {
            debug!(error = %e, "Rejected access token");
            AuthError::InvalidToken
        })?;

    Ok(AuthenticatedUser {
        identity: claims.identity,
    })
}

/// Extractor for routes that require a valid access token.
///
/// Handlers must take the tenant and user from here, never from the request
/// body or query.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?;
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Optional authentication extractor - never fails.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(authenticate(parts, state).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{Identity, JwtConfig};
    use axum::http::{Request, header};
    use std::sync::Arc;

    struct TestState {
        jwt: Arc<JwtConfig>,
    }

    crate::impl_has_auth_backend!(TestState);

    fn state() -> TestState {
        TestState {
            jwt: Arc::new(JwtConfig::new(
                b"access-secret-for-testing-0123456789",
                b"refresh-secret-for-testing-0123456789",
            )),
        }
    }

    fn identity() -> Identity {
        Identity {
            id: "user-1".to_string(),
            email: "a@x.com".to_string(),
            role: "user".to_string(),
            tenant_id: "tenant-1".to_string(),
        }
    }

    fn parts_with(name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let result = Auth::from_request_parts(&mut parts, &state()).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_bearer_token_authenticates() {
        let state = state();
        let token = state.jwt.generate_access_token(&identity()).unwrap();
        let mut parts = parts_with(header::AUTHORIZATION, &format!("Bearer {}", token.as_str()));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.identity, identity());
        assert!(parts.extensions.get::<AuthenticatedUser>().is_some());
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let state = state();
        let refresh = state.jwt.generate_refresh_token(&identity()).unwrap();
        let mut parts = parts_with(
            header::COOKIE,
            &format!("accessToken={}", refresh.token.as_str()),
        );

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_optional_auth_never_fails() {
        let mut parts = parts_with(header::AUTHORIZATION, "Bearer garbage");
        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &state())
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
