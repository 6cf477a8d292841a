//! Repository for the append-only `lock_events` table.

use async_trait::async_trait;
use coedit_core::history::LockEvent;
use coedit_core::types::Timestamp;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::lock_event::LockEventRow;
use crate::store::HistoryStore;

/// Column list for `lock_events` queries.
const COLUMNS: &str = "id, resource_id, actor_id, actor_name, actor_email, action, \
                       timestamp, duration_seconds, released_by, related_lock_id, metadata";

/// Predicate matching events a user took part in.
const USER_FILTER: &str = "(actor_id = $1 OR released_by = $1)";

/// PostgreSQL-backed [`HistoryStore`].
#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run a paginated SELECT whose optional `$1` is `key`, followed by
    /// `LIMIT` and `OFFSET` parameters.
    async fn fetch(
        &self,
        query: &str,
        key: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LockEvent>, StoreError> {
        let q = sqlx::query_as::<_, LockEventRow>(query);
        let q = match key {
            Some(key) => q.bind(key.to_string()),
            None => q,
        };
        let rows = q.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        rows.into_iter().map(LockEvent::try_from).collect()
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn insert(&self, event: &LockEvent) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO lock_events ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&query)
            .bind(event.id)
            .bind(&event.resource_id)
            .bind(&event.actor_id)
            .bind(&event.actor_name)
            .bind(&event.actor_email)
            .bind(event.action.as_str())
            .bind(event.timestamp)
            .bind(event.duration_seconds)
            .bind(&event.released_by)
            .bind(event.related_lock_id)
            .bind(&event.metadata)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_resource(
        &self,
        resource_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LockEvent>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM lock_events WHERE resource_id = $1 \
             ORDER BY timestamp DESC, id DESC LIMIT $2 OFFSET $3"
        );
        self.fetch(&query, Some(resource_id), limit, offset).await
    }

    async fn count_for_resource(&self, resource_id: &str) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM lock_events WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LockEvent>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM lock_events WHERE {USER_FILTER} \
             ORDER BY timestamp DESC, id DESC LIMIT $2 OFFSET $3"
        );
        self.fetch(&query, Some(user_id), limit, offset).await
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        let query = format!("SELECT COUNT(*)::BIGINT FROM lock_events WHERE {USER_FILTER}");
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<LockEvent>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM lock_events \
             ORDER BY timestamp DESC, id DESC LIMIT $1 OFFSET $2"
        );
        self.fetch(&query, None, limit, 0).await
    }

    async fn all_for_resource(&self, resource_id: &str) -> Result<Vec<LockEvent>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM lock_events WHERE resource_id = $1 \
             ORDER BY timestamp ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, LockEventRow>(&query)
            .bind(resource_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LockEvent::try_from).collect()
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM lock_events WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
