pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use axum::Router;
use db::{Database, RefreshTokenStore};
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Prefix every API route is served under.
pub const API_PREFIX: &str = "/api/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens, distinct from the access secret
    pub refresh_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Login rate limiter, shared by the router and the cleanup scheduler
    pub rate_limit: Arc<RateLimitConfig>,
}

impl ServerConfig {
    fn refresh_store(&self) -> Arc<dyn RefreshTokenStore> {
        Arc::new(self.db.refresh_tokens())
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(
        &config.access_secret,
        &config.refresh_secret,
    ));
    let sessions = SessionManager::new(jwt.clone(), config.refresh_store());
    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        sessions,
        config.secure_cookies,
        config.rate_limit.clone(),
    );

    Router::new().nest(API_PREFIX, api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(config: &ServerConfig) {
    let store = config.refresh_store();
    cleanup::run_cleanup(store.as_ref(), &config.rate_limit).await;
    cleanup::spawn_cleanup_scheduler(store, config.rate_limit.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
