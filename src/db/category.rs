//! Categories, the reference tenant-scoped resource.
//!
//! Every query takes the tenant id as an explicit argument and filters on it,
//! including updates and deletes by primary key.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CategoryStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

/// Partial update; `None` leaves the column untouched. For the nullable
/// columns `Some(None)` clears the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryUpdate<'a> {
    pub name: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub image_url: Option<Option<&'a str>>,
}

impl CategoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        category: NewCategory<'_>,
    ) -> Result<Category, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO categories (tenant_id, name, description, image_url) VALUES (?, ?, ?, ?)
             RETURNING id, tenant_id, name, description, image_url, created_at",
        )
        .bind(tenant_id)
        .bind(category.name)
        .bind(category.description)
        .bind(category.image_url)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn name_exists(&self, tenant_id: &str, name: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM categories WHERE tenant_id = ? AND name = ?")
                .bind(tenant_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn list(&self, tenant_id: &str) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, tenant_id, name, description, image_url, created_at
             FROM categories WHERE tenant_id = ? ORDER BY created_at, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, tenant_id: &str, id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, tenant_id, name, description, image_url, created_at
             FROM categories WHERE tenant_id = ? AND id = ?",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Returns false if no category with this id exists in the tenant.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: i64,
        update: CategoryUpdate<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE categories SET
                name = COALESCE(?, name),
                description = CASE WHEN ? THEN ? ELSE description END,
                image_url = CASE WHEN ? THEN ? ELSE image_url END
             WHERE tenant_id = ? AND id = ?",
        )
        .bind(update.name)
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
        let result = sqlx::query("DELETE FROM categories WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn named(name: &str) -> NewCategory<'_> {
        NewCategory {
            name,
            description: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_categories_are_scoped_by_tenant() {
        let db = Database::open(":memory:").await.unwrap();
        let acme = db.tenants().create("Acme", "acme").await.unwrap();
        let globex = db.tenants().create("Globex", "globex").await.unwrap();

        let drinks = db.categories().create(&acme, named("Drinks")).await.unwrap();
        db.categories().create(&globex, named("Drinks")).await.unwrap();

        assert_eq!(db.categories().list(&acme).await.unwrap().len(), 1);
        assert!(db.categories().get(&globex, drinks.id).await.unwrap().is_none());
        assert!(!db.categories().delete(&globex, drinks.id).await.unwrap());
        let hijack = CategoryUpdate {
            name: Some("Hacked"),
            ..Default::default()
        };
        assert!(!db.categories().update(&globex, drinks.id, hijack).await.unwrap());

        let still = db.categories().get(&acme, drinks.id).await.unwrap().unwrap();
        assert_eq!(still.name, "Drinks");
    }

    #[tokio::test]
    async fn test_duplicate_name_within_tenant_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let acme = db.tenants().create("Acme", "acme").await.unwrap();

        db.categories().create(&acme, named("Food")).await.unwrap();
        assert!(db.categories().name_exists(&acme, "Food").await.unwrap());
        assert!(db.categories().create(&acme, named("Food")).await.is_err());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_columns() {
        let db = Database::open(":memory:").await.unwrap();
        let acme = db.tenants().create("Acme", "acme").await.unwrap();
        let created = db
            .categories()
            .create(
                &acme,
                NewCategory {
                    name: "Food",
                    description: Some("Hot meals"),
                    image_url: None,
                },
            )
            .await
            .unwrap();

        let update = CategoryUpdate {
            name: Some("Meals"),
            ..Default::default()
        };
        assert!(db.categories().update(&acme, created.id, update).await.unwrap());

        let updated = db.categories().get(&acme, created.id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Meals");
        assert_eq!(updated.description.as_deref(), Some("Hot meals"));
    }

    #[tokio::test]
    async fn test_update_can_clear_optional_columns() {
        let db = Database::open(":memory:").await.unwrap();
        let acme = db.tenants().create("Acme", "acme").await.unwrap();
        let created = db
            .categories()
            .create(
                &acme,
                NewCategory {
                    name: "Food",
                    description: Some("Hot meals"),
                    image_url: Some("https://img/food.png"),
                },
            )
            .await
            .unwrap();

        let update = CategoryUpdate {
            description: Some(None),
            ..Default::default()
        };
        assert!(db.categories().update(&acme, created.id, update).await.unwrap());

        let updated = db.categories().get(&acme, created.id).await.unwrap().unwrap();
        assert!(updated.description.is_none());
        assert_eq!(updated.image_url.as_deref(), Some("https://img/food.png"));
    }
}
