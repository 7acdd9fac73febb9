mod auth;
mod categories;
mod error;
mod fields;
mod foods;
mod tenants;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionManager;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    sessions: SessionManager,
    secure_cookies: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        sessions,
        secure_cookies,
        rate_limit_config,
    };

    let tenants_state = tenants::TenantsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let categories_state = categories::CategoriesState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let foods_state = foods::FoodsState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/tenant", tenants::router(tenants_state))
        .nest("/category", categories::router(categories_state))
        .nest("/food", foods::router(foods_state))
}
