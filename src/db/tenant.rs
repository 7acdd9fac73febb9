use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TenantStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub subdomain: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: String,
    name: String,
    subdomain: String,
    is_active: i32,
    created_at: String,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            subdomain: row.subdomain,
            is_active: row.is_active != 0,
            created_at: row.created_at,
        }
    }
}

impl TenantStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an active tenant and return its id.
    pub async fn create(&self, name: &str, subdomain: &str) -> Result<String, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO tenants (id, name, subdomain) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(subdomain)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Tenant>, sqlx::Error> {
        let row: Option<TenantRow> = sqlx::query_as(
            "SELECT id, name, subdomain, is_active, created_at FROM tenants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Tenant::from))
    }

    pub async fn get_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, sqlx::Error> {
        let row: Option<TenantRow> = sqlx::query_as(
            "SELECT id, name, subdomain, is_active, created_at FROM tenants WHERE subdomain = ?",
        )
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Tenant::from))
    }

    /// Activate or deactivate a tenant. Users of an inactive tenant cannot log
    /// in. Returns the tenant id, or None if no tenant has this subdomain.
    pub async fn set_active_by_subdomain(
        &self,
        subdomain: &str,
        active: bool,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("UPDATE tenants SET is_active = ? WHERE subdomain = ? RETURNING id")
                .bind(active as i32)
                .bind(subdomain)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }
}
