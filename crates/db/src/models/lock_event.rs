//! Row model for the append-only `lock_events` table.
//!
//! No `updated_at` column: rows are immutable once written.

use coedit_core::history::LockEvent;
use coedit_core::types::Timestamp;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::StoreError;

/// A row from the `lock_events` table.
#[derive(Debug, Clone, FromRow)]
pub struct LockEventRow {
    pub id: Uuid,
    pub resource_id: String,
    pub actor_id: String,
    pub actor_name: String,
    pub actor_email: String,
    pub action: String,
    pub timestamp: Timestamp,
    pub duration_seconds: Option<i64>,
    pub released_by: Option<String>,
    pub related_lock_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

impl TryFrom<LockEventRow> for LockEvent {
    type Error = StoreError;

    fn try_from(row: LockEventRow) -> Result<Self, Self::Error> {
        let action = row
            .action
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("lock_events.{}: {e}", row.id)))?;
        Ok(LockEvent {
            id: row.id,
            resource_id: row.resource_id,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            actor_email: row.actor_email,
            action,
            timestamp: row.timestamp,
            duration_seconds: row.duration_seconds,
            released_by: row.released_by,
            related_lock_id: row.related_lock_id,
            metadata: row.metadata,
        })
    }
}
