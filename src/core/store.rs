use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use uuid::Uuid;

use crate::core::error::{ConfigError, Error};
use crate::types::user::UserRecord;

/// Record store boundary. Keyed by `user_id`; read-after-write consistent
/// for a single key, no cross-key transactions.
#[async_trait]
pub(crate) trait RecordStore: Send + Sync {
    async fn get(&self, user_id: &Uuid) -> Result<Option<UserRecord>, Error>;

    /// Single atomic write: insert or full overwrite of one record.
    async fn put(&self, record: &UserRecord) -> Result<(), Error>;

    /// Returns whether a record existed.
    async fn delete(&self, user_id: &Uuid) -> Result<bool, Error>;

    /// All records in stable `(created_at, user_id)` order.
    async fn scan_all(&self) -> Result<Vec<UserRecord>, Error>;
}

#[derive(Clone, Debug)]
pub(crate) struct PgRecordStore {
    pub(crate) pool: PgPool,
}

impl PgRecordStore {
    pub(crate) async fn connect(database_url: &str) -> Result<Self, ConfigError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get(&self, user_id: &Uuid) -> Result<Option<UserRecord>, Error> {
        match sqlx::query("SELECT user_id, name, email, created_at FROM users WHERE user_id = $1;")
            .bind(user_id)
            .map(map_record)
            .fetch_one(&self.pool)
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(sqlx::Error::RowNotFound) => Ok(None),
            Err(e) => Err(Error::Sql(e)),
        }
    }

    async fn put(&self, record: &UserRecord) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO users (user_id, name, email, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET name = EXCLUDED.name, email = EXCLUDED.email;",
        )
        .bind(record.user_id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, user_id: &Uuid) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1;")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan_all(&self) -> Result<Vec<UserRecord>, Error> {
        let records = sqlx::query(
            "SELECT user_id, name, email, created_at FROM users ORDER BY created_at, user_id;",
        )
        .map(map_record)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

fn map_record(row: PgRow) -> UserRecord {
    UserRecord {
        user_id: row.get("user_id"),
        name: row.get("name"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct MemoryRecordStore {
        records: RwLock<HashMap<Uuid, UserRecord>>,
    }

    impl MemoryRecordStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryRecordStore {
        async fn get(&self, user_id: &Uuid) -> Result<Option<UserRecord>, Error> {
            Ok(self.records.read().await.get(user_id).cloned())
        }

        async fn put(&self, record: &UserRecord) -> Result<(), Error> {
            self.records
                .write()
                .await
                .insert(record.user_id, record.clone());

            Ok(())
        }

        async fn delete(&self, user_id: &Uuid) -> Result<bool, Error> {
            Ok(self.records.write().await.remove(user_id).is_some())
        }

        async fn scan_all(&self) -> Result<Vec<UserRecord>, Error> {
            let mut records: Vec<UserRecord> =
                self.records.read().await.values().cloned().collect();
            records.sort_by(|a, b| {
                (a.created_at, a.user_id).cmp(&(b.created_at, b.user_id))
            });

            Ok(records)
        }
    }
}
