//! Food endpoints.
//!
//! - GET `/` - Foods of the caller's tenant, optionally `?categoryId=N`
//! - GET `/all` - Every food of the caller's tenant
//! - POST `/` - Create a food in one of the tenant's categories
//! - PATCH `/{id}` - Partial update; a blank description or image URL clears it
//! - DELETE `/{id}` - Delete a food
//! - GET `/{subdomain}` - Public menu of a tenant, no auth

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::{
    ApiError, ResultExt, is_foreign_key_violation, is_unique_violation, parse_json,
};
use super::fields::{blank_to_none, validate_name};
use super::tenants::{PublicListing, find_public_tenant};
use crate::auth::Auth;
use crate::db::{Database, FoodUpdate, NewFood};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

const DUPLICATE_NAME: &str = "Food already exists";
const UNKNOWN_CATEGORY: &str = "Category not found";

#[derive(Clone)]
pub struct FoodsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(FoodsState);

pub fn router(state: FoodsState) -> Router {
    Router::new()
        .route("/", get(list_foods).post(create_food))
        .route("/all", get(list_all_foods))
        .route(
            "/{key}",
            get(public_foods).patch(update_food).delete(delete_food),
        )
        .with_state(state)
}

fn validate_price(price: f64) -> Result<(), ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::bad_request("Price must be a non-negative number"));
    }
    Ok(())
}

/// Unique and foreign key violations are the client's fault: a duplicate name
/// or a category outside the tenant.
fn write_error(e: sqlx::Error, msg: &str) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::conflict(DUPLICATE_NAME)
    } else if is_foreign_key_violation(&e) {
        ApiError::bad_request(UNKNOWN_CATEGORY)
    } else {
        ApiError::db_error(msg, e)
    }
}

async fn ensure_category(db: &Database, tenant_id: &str, category_id: i64) -> Result<(), ApiError> {
    db.categories()
        .get(tenant_id, category_id)
        .await
        .db_err("Failed to get category")?
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request(UNKNOWN_CATEGORY))
}

#[derive(Deserialize)]
struct ListFoodsQuery {
    #[serde(rename = "categoryId")]
    category_id: Option<String>,
}

async fn list_foods(
    State(state): State<FoodsState>,
    Auth(auth): Auth,
    Query(query): Query<ListFoodsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category_id = match query.category_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| ApiError::bad_request("categoryId must be an integer"))?,
        ),
    };

    let foods = state
        .db
        .foods()
        .list(auth.tenant_id(), category_id)
        .await
        .db_err("Failed to list foods")?;

    Ok(Json(foods))
}

async fn list_all_foods(
    State(state): State<FoodsState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let foods = state
        .db
        .foods()
        .list(auth.tenant_id(), None)
        .await
        .db_err("Failed to list foods")?;

    Ok(Json(foods))
}

async fn public_foods(
    State(state): State<FoodsState>,
    Path(subdomain): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = find_public_tenant(&state.db, &subdomain).await?;
    let foods = state
        .db
        .foods()
        .list(&tenant.id, None)
        .await
        .db_err("Failed to list foods")?;

    Ok(Json(PublicListing::new(tenant, foods)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFoodRequest {
    #[serde(default)]
    name: String,
    price: Option<f64>,
    category_id: Option<i64>,
    description: Option<String>,
    image_url: Option<String>,
}

async fn create_food(
    State(state): State<FoodsState>,
    Auth(auth): Auth,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: CreateFoodRequest = parse_json(&body)?;
    let tenant_id = auth.tenant_id();

    let name = payload.name.trim();
    validate_name(name)?;
    let (Some(price), Some(category_id)) = (payload.price, payload.category_id) else {
        return Err(ApiError::bad_request("Price and categoryId are required"));
    };
    validate_price(price)?;
    ensure_category(&state.db, tenant_id, category_id).await?;

    let foods = state.db.foods();
    if foods
        .name_exists(tenant_id, name)
        .await
        .db_err("Failed to check food name")?
    {
        return Err(ApiError::conflict(DUPLICATE_NAME));
    }

    let food = foods
        .create(
            tenant_id,
            NewFood {
                category_id,
                name,
                price,
                description: payload.description.as_deref().and_then(blank_to_none),
                image_url: payload.image_url.as_deref().and_then(blank_to_none),
            },
        )
        .await
        .map_err(|e| write_error(e, "Failed to create food"))?;

    info!(tenant_id = %tenant_id, food_id = food.id, "Food created");

    Ok((StatusCode::CREATED, Json(food)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateFoodRequest {
    name: Option<String>,
    price: Option<f64>,
    category_id: Option<i64>,
    description: Option<String>,
    image_url: Option<String>,
}

async fn update_food(
    State(state): State<FoodsState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: UpdateFoodRequest = parse_json(&body)?;
    let foods = state.db.foods();
    let tenant_id = auth.tenant_id();

    let existing = foods
        .get(tenant_id, id)
        .await
        .db_err("Failed to get food")?
        .ok_or_else(|| ApiError::not_found("Food not found"))?;

    let name = payload.name.as_deref().map(str::trim);
    if let Some(name) = name {
        validate_name(name)?;
        if name != existing.name
            && foods
                .name_exists(tenant_id, name)
                .await
                .db_err("Failed to check food name")?
        {
            return Err(ApiError::conflict(DUPLICATE_NAME));
        }
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
    }
    if let Some(category_id) = payload.category_id {
        ensure_category(&state.db, tenant_id, category_id).await?;
    }

    let updated = foods
        .update(
            tenant_id,
            id,
            FoodUpdate {
                category_id: payload.category_id,
                name,
                price: payload.price,
                description: payload.description.as_deref().map(blank_to_none),
                image_url: payload.image_url.as_deref().map(blank_to_none),
            },
        )
        .await
        .map_err(|e| write_error(e, "Failed to update food"))?;

    if !updated {
        return Err(ApiError::not_found("Food not found"));
    }

    let food = foods
        .get(tenant_id, id)
        .await
        .db_err("Failed to get food")?
        .ok_or_else(|| ApiError::not_found("Food not found"))?;

    Ok(Json(food))
}

async fn delete_food(
    State(state): State<FoodsState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .foods()
        .delete(auth.tenant_id(), id)
        .await
        .db_err("Failed to delete food")?;

    if !deleted {
        return Err(ApiError::not_found("Food not found"));
    }

    info!(tenant_id = %auth.tenant_id(), food_id = id, "Food deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_must_be_finite_and_non_negative() {
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(12.5).is_ok());
        assert!(validate_price(-1.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_price(f64::INFINITY).is_err());
    }

    #[test]
    fn test_write_error_mapping() {
        assert!(matches!(
            write_error(sqlx::Error::PoolTimedOut, "Failed to create food"),
            ApiError::Internal(_)
        ));
    }
}
