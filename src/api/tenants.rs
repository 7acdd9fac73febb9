use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::Auth;
use crate::db::{Database, Tenant};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct TenantsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(TenantsState);

pub fn router(state: TenantsState) -> Router {
    Router::new().route("/", get(get_tenant)).with_state(state)
}

/// The tenant named in the caller's access token.
async fn get_tenant(
    State(state): State<TenantsState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = state
        .db
        .tenants()
        .get_by_id(auth.tenant_id())
        .await
        .db_err("Failed to get tenant")?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;

    Ok(Json(tenant))
}

/// Tenant header of the public menu responses.
#[derive(Serialize)]
pub struct PublicTenant {
    pub id: String,
    pub name: String,
}

/// Public listing: `{"tenant": {...}, "data": [...]}`.
#[derive(Serialize)]
pub struct PublicListing<T> {
    pub tenant: PublicTenant,
    pub data: Vec<T>,
}

/// Resolve the tenant named by a public menu URL. Inactive tenants are
/// reported as missing.
pub async fn find_public_tenant(db: &Database, subdomain: &str) -> Result<Tenant, ApiError> {
    db.tenants()
        .get_by_subdomain(subdomain)
        .await
        .db_err("Failed to look up tenant")?
        .filter(|t| t.is_active)
        .ok_or_else(|| ApiError::not_found("Tenant not found"))
}

impl<T> PublicListing<T> {
    pub fn new(tenant: Tenant, data: Vec<T>) -> Self {
        Self {
            tenant: PublicTenant {
                id: tenant.id,
                name: tenant.name,
            },
            data,
        }
    }
}
