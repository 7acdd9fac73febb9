//! Refresh token storage.
//!
//! Only refresh tokens are persisted; access tokens are stateless. Each user
//! has at most one live refresh record, so logging in again or refreshing
//! replaces whatever token the user held before.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use tokio::sync::Mutex;

/// A persisted refresh token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRefreshToken {
    pub user_id: String,
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: i64,
}

impl StoredRefreshToken {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// Keyed store for the single refresh record of each user.
///
/// Every access is by exact key: `user_id` for writes, the token value for
/// lookups and deletes.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Create or overwrite the refresh record of a user.
    async fn upsert(&self, user_id: &str, token: &str, expires_at: i64) -> Result<(), sqlx::Error>;

    async fn find_by_token(&self, token: &str) -> Result<Option<StoredRefreshToken>, sqlx::Error>;

    /// Delete every record holding this token value.
    async fn delete_by_token(&self, token: &str) -> Result<u64, sqlx::Error>;

    /// Replace `old_token` with `new_token` only if the user still holds
    /// `old_token`. Returns false when another writer got there first.
    async fn rotate(
        &self,
        user_id: &str,
        old_token: &str,
        new_token: &str,
        expires_at: i64,
    ) -> Result<bool, sqlx::Error>;

    async fn delete_by_user(&self, user_id: &str) -> Result<u64, sqlx::Error>;

    /// Delete all records whose expiry is before `now`.
    async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error>;
}

/// SQLite-backed refresh token store.
#[derive(Clone)]
pub struct SqliteRefreshTokenStore {
    pool: SqlitePool,
}

impl SqliteRefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Revoke the sessions of every user of a tenant.
    pub async fn delete_by_tenant(&self, tenant_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE user_id IN (SELECT id FROM users WHERE tenant_id = ?)",
        )
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RefreshTokenStore for SqliteRefreshTokenStore {
    async fn upsert(&self, user_id: &str, token: &str, expires_at: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET token = excluded.token, expires_at = excluded.expires_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<StoredRefreshToken>, sqlx::Error> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT user_id, token, expires_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, token, expires_at)| StoredRefreshToken {
            user_id,
            token,
            expires_at,
        }))
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rotate(
        &self,
        user_id: &str,
        old_token: &str,
        new_token: &str,
        expires_at: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET token = ?, expires_at = ? WHERE user_id = ? AND token = ?",
        )
        .bind(new_token)
        .bind(expires_at)
        .bind(user_id)
        .bind(old_token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory refresh token store keyed by user id.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: Mutex<HashMap<String, StoredRefreshToken>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn get_by_user(&self, user_id: &str) -> Option<StoredRefreshToken> {
        self.records.lock().await.get(user_id).cloned()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn upsert(&self, user_id: &str, token: &str, expires_at: i64) -> Result<(), sqlx::Error> {
        let mut records = self.records.lock().await;
        // The token column is unique as well.
        records.retain(|uid, record| uid == user_id || record.token != token);
        records.insert(
            user_id.to_string(),
            StoredRefreshToken {
                user_id: user_id.to_string(),
                token: token.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<StoredRefreshToken>, sqlx::Error> {
        let records = self.records.lock().await;
        Ok(records.values().find(|r| r.token == token).cloned())
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, sqlx::Error> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.token != token);
        Ok((before - records.len()) as u64)
    }

    async fn rotate(
        &self,
        user_id: &str,
        old_token: &str,
        new_token: &str,
        expires_at: i64,
    ) -> Result<bool, sqlx::Error> {
        let mut records = self.records.lock().await;
        match records.get_mut(user_id) {
            Some(record) if record.token == old_token => {
                record.token = new_token.to_string();
                record.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        Ok(self.records.lock().await.remove(user_id).map_or(0, |_| 1))
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewUser};

    async fn setup() -> (Database, String) {
        let db = Database::open(":memory:").await.unwrap();
        let tenant = db.tenants().create("Acme", "acme").await.unwrap();
        let user = db
            .users()
            .create(NewUser {
                tenant_id: &tenant,
                email: "a@x.com",
                name: "Alice",
                password_hash: "hash",
                role: "user",
            })
            .await
            .unwrap();
        (db, user)
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_token() {
        let (db, user) = setup().await;
        let store = db.refresh_tokens();

        store.upsert(&user, "first", 100).await.unwrap();
        store.upsert(&user, "second", 200).await.unwrap();

        assert!(store.find_by_token("first").await.unwrap().is_none());
        let record = store.find_by_token("second").await.unwrap().unwrap();
        assert_eq!(record.user_id, user);
        assert_eq!(record.expires_at, 200);
    }

    #[tokio::test]
    async fn test_rotate_requires_current_token() {
        let (db, user) = setup().await;
        let store = db.refresh_tokens();
        store.upsert(&user, "current", 100).await.unwrap();

        assert!(!store.rotate(&user, "stale", "next", 200).await.unwrap());
        assert!(store.find_by_token("next").await.unwrap().is_none());

        assert!(store.rotate(&user, "current", "next", 200).await.unwrap());
        assert!(store.find_by_token("current").await.unwrap().is_none());
        assert!(!store.rotate(&user, "current", "other", 300).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_by_token_and_user() {
        let (db, user) = setup().await;
        let store = db.refresh_tokens();

        store.upsert(&user, "token", 100).await.unwrap();
        assert_eq!(store.delete_by_token("missing").await.unwrap(), 0);
        assert_eq!(store.delete_by_token("token").await.unwrap(), 1);

        store.upsert(&user, "token", 100).await.unwrap();
        assert_eq!(store.delete_by_user(&user).await.unwrap(), 1);
        assert!(store.find_by_token("token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (db, user) = setup().await;
        let store = db.refresh_tokens();
        store.upsert(&user, "token", 100).await.unwrap();

        assert_eq!(store.delete_expired(100).await.unwrap(), 0);
        assert_eq!(store.delete_expired(101).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_matches_sqlite_semantics() {
        let store = MemoryRefreshTokenStore::new();

        store.upsert("u1", "first", 100).await.unwrap();
        store.upsert("u1", "second", 100).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.find_by_token("first").await.unwrap().is_none());

        assert!(!store.rotate("u1", "first", "third", 200).await.unwrap());
        assert!(store.rotate("u1", "second", "third", 200).await.unwrap());
        assert_eq!(store.get_by_user("u1").await.unwrap().token, "third");

        assert_eq!(store.delete_expired(201).await.unwrap(), 1);
        assert_eq!(store.len().await, 0);
    }

    #[test]
    fn test_expiry_boundary() {
        let record = StoredRefreshToken {
            user_id: "u".to_string(),
            token: "t".to_string(),
            expires_at: 100,
        };
        assert!(!record.is_expired(99));
        assert!(!record.is_expired(100));
        assert!(record.is_expired(101));
    }
}
