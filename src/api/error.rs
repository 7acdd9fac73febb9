//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error};

use crate::auth::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie};
use crate::session::SessionError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
    fn internal_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
    fn internal_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal_error(msg, e))
    }
}

/// Error mapping for writes guarded by a UNIQUE constraint. A unique violation
/// is a 409 even when the existence check before the write passed.
pub trait WriteResultExt<T> {
    fn conflict_or_db_err(self, conflict: &str, msg: &str) -> Result<T, ApiError>;
}

impl<T> WriteResultExt<T> for Result<T, sqlx::Error> {
    fn conflict_or_db_err(self, conflict: &str, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            if is_unique_violation(&e) {
                debug!("{}: {}", msg, e);
                ApiError::conflict(conflict)
            } else {
                ApiError::db_error(msg, e)
            }
        })
    }
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_unique_violation())
}

pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_foreign_key_violation())
}

/// Parse a JSON request body, reporting malformed input as a 400 with the
/// usual `{"error": ...}` body instead of axum's plain-text rejection.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        ApiError::bad_request("Invalid JSON body")
    })
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
    /// A dead session: 403 and both session cookies cleared.
    SessionEnded { message: String, secure: bool },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }

    pub fn internal_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Something went wrong. Please try again.".into())
    }

    /// Map a failed refresh to a response. Client-caused failures end the
    /// session; store and signing failures are logged and reported as 500.
    pub fn from_session(e: SessionError, secure_cookies: bool) -> Self {
        let message = match e {
            SessionError::MissingRefreshToken => "Refresh token is required",
            SessionError::SessionExpired => "Session expired. Please log in again.",
            SessionError::InvalidRefreshToken => "Invalid refresh token",
            SessionError::Token(_) | SessionError::Store(_) => {
                return Self::internal_error("Refresh failed", e);
            }
        };
        Self::SessionEnded {
            message: message.into(),
            secure: secure_cookies,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, clear_cookies) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            ApiError::SessionEnded { message, secure } => {
                (StatusCode::FORBIDDEN, message, Some(secure))
            }
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();

        if let Some(secure) = clear_cookies {
            let headers = response.headers_mut();
            for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
                if let Ok(value) = HeaderValue::from_str(&clear_cookie(name, secure)) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_clear_cookies() {
        let response = ApiError::from_session(SessionError::SessionExpired, true).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_conflict() {
        let db = crate::db::Database::open(":memory:").await.unwrap();
        db.tenants().create("Acme", "acme").await.unwrap();

        let err = db
            .tenants()
            .create("Other", "acme")
            .await
            .conflict_or_db_err("Subdomain taken", "Failed to create tenant")
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Subdomain taken"));

        let err: ApiError = Err::<(), _>(sqlx::Error::PoolTimedOut)
            .conflict_or_db_err("Subdomain taken", "Failed to create tenant")
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        #[derive(Debug, serde::Deserialize)]
        struct Body {
            #[allow(dead_code)]
            name: String,
        }

        let err = parse_json::<Body>(b"{not json").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(parse_json::<Body>(br#"{"name": 5}"#).is_err());
        assert!(parse_json::<Body>(br#"{"name": "ok"}"#).is_ok());
    }

    #[test]
    fn test_store_failure_is_internal() {
        let response =
            ApiError::from_session(SessionError::Store(sqlx::Error::PoolTimedOut), true)
                .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}
