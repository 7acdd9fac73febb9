#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use tenantgate::{
    ServerConfig,
    auth::ClientIpHeader,
    create_app,
    db::{Database, NewUser},
    jwt::JwtConfig,
    password::hash_password,
    rate_limit::RateLimitConfig,
};
use std::sync::Arc;
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";

/// Address every request claims to come from, via X-Forwarded-For.
pub const CLIENT_IP: &str = "203.0.113.10";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

pub async fn setup() -> TestApp {
    setup_with_rate_limit(1000).await
}

pub async fn setup_with_rate_limit(login_per_minute: u32) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        secure_cookies: false,
        rate_limit: Arc::new(RateLimitConfig::new(
            login_per_minute,
            Some(ClientIpHeader::XForwardedFor),
        )),
    };
    TestApp {
        app: create_app(&config),
        db,
        jwt: JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET),
    }
}

pub async fn create_tenant(db: &Database, name: &str, subdomain: &str) -> String {
    db.tenants().create(name, subdomain).await.unwrap()
}

pub async fn create_user(
    db: &Database,
    tenant_id: &str,
    email: &str,
    password: &str,
    role: &str,
) -> String {
    let password_hash = hash_password(password).unwrap();
    db.users()
        .create(NewUser {
            tenant_id,
            email,
            name: "Test User",
            password_hash: &password_hash,
            role,
        })
        .await
        .unwrap()
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Log in and return (access_token, refresh_token) from the response body.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/v1/auth/login",
                serde_json::json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(response.status(), 200, "login failed for {}", email);
        let body = body_json(response).await;
        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

/// Request carrying an access token as a bearer header.
pub fn bearer_request(
    method: Method,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Bearer request with a body sent verbatim, for malformed JSON.
pub fn bearer_raw_request(method: Method, uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Request carrying a single cookie.
pub fn cookie_request(method: Method, uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("{}={}", name, value))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Full Set-Cookie line for the named cookie.
pub fn set_cookie_for(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
}

/// Value of the named cookie as set by the response.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let line = set_cookie_for(response, name)?;
    let value = line.split(';').next()?.split_once('=')?.1;
    Some(value.to_string())
}
