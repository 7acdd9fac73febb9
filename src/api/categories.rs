//! Category endpoints.
//!
//! - GET `/` and GET `/all` - Categories of the caller's tenant
//! - POST `/` - Create a category
//! - PATCH `/{id}` - Partial update; a blank description or image URL clears it
//! - DELETE `/{id}` - Delete a category and its foods
//! - GET `/{subdomain}` - Public menu categories of a tenant, no auth
//!
//! Authenticated handlers scope by the tenant in the access token. A category
//! of another tenant looks exactly like a missing one.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, WriteResultExt, parse_json};
use super::fields::{blank_to_none, validate_name};
use super::tenants::{PublicListing, find_public_tenant};
use crate::auth::Auth;
use crate::db::{CategoryUpdate, Database, NewCategory};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

const DUPLICATE_NAME: &str = "Category already exists";

#[derive(Clone)]
pub struct CategoriesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(CategoriesState);

pub fn router(state: CategoriesState) -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/all", get(list_categories))
        .route(
            "/{key}",
            get(public_categories)
                .patch(update_category)
                .delete(delete_category),
        )
        .with_state(state)
}

async fn list_categories(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .db
        .categories()
        .list(auth.tenant_id())
        .await
        .db_err("Failed to list categories")?;

    Ok(Json(categories))
}

async fn public_categories(
    State(state): State<CategoriesState>,
    Path(subdomain): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = find_public_tenant(&state.db, &subdomain).await?;
    let categories = state
        .db
        .categories()
        .list(&tenant.id)
        .await
        .db_err("Failed to list categories")?;

    Ok(Json(PublicListing::new(tenant, categories)))
}

/// Unknown fields, including any `tenantId`, are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCategoryRequest {
    #[serde(default)]
    name: String,
    description: Option<String>,
    image_url: Option<String>,
}

async fn create_category(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: CreateCategoryRequest = parse_json(&body)?;
    let name = payload.name.trim();
    validate_name(name)?;

    let categories = state.db.categories();
    if categories
        .name_exists(auth.tenant_id(), name)
        .await
        .db_err("Failed to check category name")?
    {
        return Err(ApiError::conflict(DUPLICATE_NAME));
    }

    let category = categories
        .create(
            auth.tenant_id(),
            NewCategory {
                name,
                description: payload.description.as_deref().and_then(blank_to_none),
                image_url: payload.image_url.as_deref().and_then(blank_to_none),
            },
        )
        .await
        .conflict_or_db_err(DUPLICATE_NAME, "Failed to create category")?;

    info!(tenant_id = %auth.tenant_id(), category_id = category.id, "Category created");

    Ok((StatusCode::CREATED, Json(category)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCategoryRequest {
    name: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
}

async fn update_category(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: UpdateCategoryRequest = parse_json(&body)?;
    let categories = state.db.categories();
    let tenant_id = auth.tenant_id();

    let existing = categories
        .get(tenant_id, id)
        .await
        .db_err("Failed to get category")?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let name = payload.name.as_deref().map(str::trim);
    if let Some(name) = name {
        validate_name(name)?;
        if name != existing.name
            && categories
                .name_exists(tenant_id, name)
                .await
                .db_err("Failed to check category name")?
        {
            return Err(ApiError::conflict(DUPLICATE_NAME));
        }
    }

    let updated = categories
        .update(
            tenant_id,
            id,
            CategoryUpdate {
                name,
                description: payload.description.as_deref().map(blank_to_none),
                image_url: payload.image_url.as_deref().map(blank_to_none),
            },
        )
        .await
        .conflict_or_db_err(DUPLICATE_NAME, "Failed to update category")?;

    if !updated {
        return Err(ApiError::not_found("Category not found"));
    }

    let category = categories
        .get(tenant_id, id)
        .await
        .db_err("Failed to get category")?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(category))
}

async fn delete_category(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .categories()
        .delete(auth.tenant_id(), id)
        .await
        .db_err("Failed to delete category")?;

    if !deleted {
        return Err(ApiError::not_found("Category not found"));
    }

    info!(tenant_id = %auth.tenant_id(), category_id = id, "Category deleted");

    Ok(StatusCode::NO_CONTENT)
}
