//! Foods, each filed under a category of the same tenant.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct FoodStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: i64,
    pub tenant_id: String,
    pub category_id: i64,
    pub category_name: String,
    pub name: String,
    pub price: f64,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy)]
pub struct NewFood<'a> {
    pub category_id: i64,
    pub name: &'a str,
    pub price: f64,
    pub description: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

/// Partial update with the same conventions as `CategoryUpdate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoodUpdate<'a> {
    pub category_id: Option<i64>,
    pub name: Option<&'a str>,
    pub price: Option<f64>,
    pub description: Option<Option<&'a str>>,
    pub image_url: Option<Option<&'a str>>,
}

impl FoodStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fails with a foreign key violation if the category is not one of the
    /// tenant's.
    pub async fn create(&self, tenant_id: &str, food: NewFood<'_>) -> Result<Food, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO foods (tenant_id, category_id, name, price, description, image_url)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(tenant_id)
        .bind(food.category_id)
        .bind(food.name)
        .bind(food.price)
        .bind(food.description)
        .bind(food.image_url)
        .fetch_one(&self.pool)
        .await?;

        self.get(tenant_id, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn name_exists(&self, tenant_id: &str, name: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM foods WHERE tenant_id = ? AND name = ?")
                .bind(tenant_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Foods of the tenant, optionally only those of one category.
    pub async fn list(
        &self,
        tenant_id: &str,
        category_id: Option<i64>,
    ) -> Result<Vec<Food>, sqlx::Error> {
        sqlx::query_as(
            "SELECT f.id, f.tenant_id, f.category_id, c.name AS category_name, f.name, f.price,
                    f.description, f.image_url, f.created_at
             FROM foods f JOIN categories c ON c.id = f.category_id
             WHERE f.tenant_id = ? AND (? IS NULL OR f.category_id = ?)
             ORDER BY f.created_at, f.id",
        )
        .bind(tenant_id)
        .bind(category_id)
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, tenant_id: &str, id: i64) -> Result<Option<Food>, sqlx::Error> {
        sqlx::query_as(
            "SELECT f.id, f.tenant_id, f.category_id, c.name AS category_name, f.name, f.price,
                    f.description, f.image_url, f.created_at
             FROM foods f JOIN categories c ON c.id = f.category_id
             WHERE f.tenant_id = ? AND f.id = ?",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Returns false if no food with this id exists in the tenant.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: i64,
        update: FoodUpdate<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE foods SET
                category_id = COALESCE(?, category_id),
                name = COALESCE(?, name),
                price = COALESCE(?, price),
                description = CASE WHEN ? THEN ? ELSE description END,
                image_url = CASE WHEN ? THEN ? ELSE image_url END
             WHERE tenant_id = ? AND id = ?",
        )
        .bind(update.category_id)
        .bind(update.name)
        .bind(update.price)
        .bind(update.description.is_some())
        .bind(update.description.flatten())
        .bind(update.image_url.is_some())
        .bind(update.image_url.flatten())
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, tenant_id: &str, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM foods WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
