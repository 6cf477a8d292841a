//! Repository for the `resource_locks` table.

use async_trait::async_trait;
use coedit_core::lock::ResourceLock;
use coedit_core::types::Timestamp;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::lock::LockRow;
use crate::store::LockStore;

/// Column list for `resource_locks` queries.
const COLUMNS: &str = "resource_id, lock_id, holder_id, holder_name, holder_email, \
                       version, created_at, expires_at, is_active, released_at, updated_at";

/// PostgreSQL-backed [`LockStore`].
///
/// Compare-and-swap maps onto a single statement: `INSERT ... ON CONFLICT DO
/// NOTHING` when no record is expected, otherwise an `UPDATE` guarded by the
/// expected lease identity, version, expiry, and active flag.
#[derive(Clone)]
pub struct PgLockStore {
    pool: PgPool,
}

impl PgLockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockStore for PgLockStore {
    async fn get(&self, resource_id: &str) -> Result<Option<ResourceLock>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM resource_locks WHERE resource_id = $1");
        let row = sqlx::query_as::<_, LockRow>(&query)
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ResourceLock::from))
    }

    async fn compare_and_swap(
        &self,
        resource_id: &str,
        expected: Option<&ResourceLock>,
        new: &ResourceLock,
    ) -> Result<bool, StoreError> {
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT INTO resource_locks \
                     (resource_id, lock_id, holder_id, holder_name, holder_email, \
                      version, created_at, expires_at, is_active, released_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                     ON CONFLICT (resource_id) DO NOTHING",
                )
                .bind(resource_id)
                .bind(new.lock_id)
                .bind(&new.holder_id)
                .bind(&new.holder_info.name)
                .bind(&new.holder_info.email)
                .bind(new.version)
                .bind(new.created_at)
                .bind(new.expires_at)
                .bind(new.is_active)
                .bind(new.released_at)
                .execute(&self.pool)
                .await?
            }
            Some(current) => {
                sqlx::query(
                    "UPDATE resource_locks SET \
                     lock_id = $2, holder_id = $3, holder_name = $4, holder_email = $5, \
                     version = $6, created_at = $7, expires_at = $8, is_active = $9, \
                     released_at = $10, updated_at = NOW() \
                     WHERE resource_id = $1 AND lock_id = $11 AND version = $12 \
                     AND expires_at = $13 AND is_active = $14",
                )
                .bind(resource_id)
                .bind(new.lock_id)
                .bind(&new.holder_id)
                .bind(&new.holder_info.name)
                .bind(&new.holder_info.email)
                .bind(new.version)
                .bind(new.created_at)
                .bind(new.expires_at)
                .bind(new.is_active)
                .bind(new.released_at)
                .bind(current.lock_id)
                .bind(current.version)
                .bind(current.expires_at)
                .bind(current.is_active)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    async fn list_elapsed(&self, now: Timestamp) -> Result<Vec<ResourceLock>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM resource_locks \
             WHERE is_active = true AND expires_at <= $1 \
             ORDER BY expires_at ASC"
        );
        let rows = sqlx::query_as::<_, LockRow>(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ResourceLock::from).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
