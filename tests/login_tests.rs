//! Tests for the login endpoint.
//!
//! Tests cover:
//! - Successful login sets both cookies and persists the refresh record
//! - Unknown email and wrong password are indistinguishable
//! - Inactive users and inactive tenants cannot log in
//! - A second login invalidates the first refresh token
//! - Per-IP rate limiting

mod common;

use axum::http::{Method, StatusCode};
use common::{
    TestApp, body_json, cookie_value, create_tenant, create_user, json_request, set_cookie_for,
    setup, setup_with_rate_limit,
};
use tenantgate::db::RefreshTokenStore;
use tenantgate::jwt::{RefreshToken, now_unix};

const LOGIN: &str = "/api/v1/auth/login";

async fn setup_user() -> (TestApp, String, String) {
    let ctx = setup().await;
    let tenant_id = create_tenant(&ctx.db, "Acme", "acme").await;
    let user_id = create_user(&ctx.db, &tenant_id, "a@x.com", "secret", "admin").await;
    (ctx, tenant_id, user_id)
}

fn credentials(email: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "email": email, "password": password })
}

#[tokio::test]
async fn test_login_sets_cookies_and_persists_refresh_record() {
    let (ctx, tenant_id, user_id) = setup_user().await;

    let response = ctx
        .send(json_request(Method::POST, LOGIN, credentials("a@x.com", "secret")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let access_cookie = set_cookie_for(&response, "accessToken").unwrap();
    let refresh_cookie = set_cookie_for(&response, "refreshToken").unwrap();
    for cookie in [&access_cookie, &refresh_cookie] {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));
    }
    assert!(access_cookie.contains("Max-Age=259200"));
    assert!(refresh_cookie.contains("Max-Age=604800"));

    let refresh_from_cookie = cookie_value(&response, "refreshToken").unwrap();
    let body = body_json(response).await;

    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["name"], "Test User");
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["tenantId"], tenant_id.as_str());
    assert_eq!(body["refreshToken"], refresh_from_cookie.as_str());
    assert!(body["accessToken"].is_string());

    let record = ctx
        .db
        .refresh_tokens()
        .find_by_token(&refresh_from_cookie)
        .await
        .unwrap()
        .expect("refresh record should be persisted");
    assert_eq!(record.user_id, user_id);

    let expected = now_unix().unwrap() as i64 + 7 * 24 * 60 * 60;
    assert!((record.expires_at - expected).abs() <= 5);
}

#[tokio::test]
async fn test_login_tokens_carry_database_claims() {
    let (ctx, tenant_id, user_id) = setup_user().await;

    // Client-supplied role and tenant are ignored.
    let response = ctx
        .send(json_request(
            Method::POST,
            LOGIN,
            serde_json::json!({
                "email": "a@x.com",
                "password": "secret",
                "role": "superuser",
                "tenantId": "other-tenant",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let refresh = RefreshToken::from_raw(body["refreshToken"].as_str().unwrap());
    let claims = ctx.jwt.validate_refresh_token(&refresh).unwrap();
    assert_eq!(claims.identity.id, user_id);
    assert_eq!(claims.identity.role, "admin");
    assert_eq!(claims.identity.tenant_id, tenant_id);
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let (ctx, _, _) = setup_user().await;

    let response = ctx
        .send(json_request(Method::POST, LOGIN, credentials("A@X.COM", "secret")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let (ctx, _, _) = setup_user().await;

    let unknown = ctx
        .send(json_request(Method::POST, LOGIN, credentials("nobody@x.com", "secret")))
        .await;
    let wrong = ctx
        .send(json_request(Method::POST, LOGIN, credentials("a@x.com", "wrong")))
        .await;

    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookie_for(&unknown, "accessToken").is_none());
    assert!(set_cookie_for(&wrong, "accessToken").is_none());
    assert_eq!(body_json(unknown).await, body_json(wrong).await);
}

#[tokio::test]
async fn test_missing_credentials() {
    let (ctx, _, _) = setup_user().await;

    for body in [
        serde_json::json!({}),
        serde_json::json!({ "email": "a@x.com" }),
        serde_json::json!({ "password": "secret" }),
        serde_json::json!({ "email": "  ", "password": "secret" }),
        serde_json::json!({ "email": "a@x.com", "password": "" }),
    ] {
        let response = ctx.send(json_request(Method::POST, LOGIN, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Email and password are required");
    }
}

#[tokio::test]
async fn test_inactive_user_cannot_log_in() {
    let (ctx, _, _) = setup_user().await;
    ctx.db.users().set_active_by_email("a@x.com", false).await.unwrap();

    let response = ctx
        .send(json_request(Method::POST, LOGIN, credentials("a@x.com", "secret")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_inactive_tenant_blocks_its_users() {
    let (ctx, _, _) = setup_user().await;
    ctx.db.tenants().set_active_by_subdomain("acme", false).await.unwrap();

    let response = ctx
        .send(json_request(Method::POST, LOGIN, credentials("a@x.com", "secret")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_second_login_invalidates_first_refresh_token() {
    let (ctx, _, _) = setup_user().await;

    let (_, first) = ctx.login("a@x.com", "secret").await;
    let (_, second) = ctx.login("a@x.com", "secret").await;
    assert_ne!(first, second);

    let response = ctx
        .send(json_request(
            Method::POST,
            "/api/v1/auth/refresh",
            serde_json::json!({ "refreshToken": first }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .send(json_request(
            Method::POST,
            "/api/v1/auth/refresh",
            serde_json::json!({ "refreshToken": second }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_rate_limit() {
    let ctx = setup_with_rate_limit(2).await;
    let tenant_id = create_tenant(&ctx.db, "Acme", "acme").await;
    create_user(&ctx.db, &tenant_id, "a@x.com", "secret", "user").await;

    for _ in 0..2 {
        let response = ctx
            .send(json_request(Method::POST, LOGIN, credentials("a@x.com", "wrong")))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = ctx
        .send(json_request(Method::POST, LOGIN, credentials("a@x.com", "secret")))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other endpoints are not limited.
    let response = ctx
        .send(json_request(
            Method::POST,
            "/api/v1/auth/signout",
            serde_json::json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_without_client_ip_is_rejected() {
    let (ctx, _, _) = setup_user().await;

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri(LOGIN)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            credentials("a@x.com", "secret").to_string(),
        ))
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
