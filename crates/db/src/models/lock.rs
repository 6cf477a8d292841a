//! Row model for the `resource_locks` table.

use coedit_core::lock::{HolderInfo, ResourceLock};
use coedit_core::types::Timestamp;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `resource_locks` table.
#[derive(Debug, Clone, FromRow)]
pub struct LockRow {
    pub resource_id: String,
    pub lock_id: Uuid,
    pub holder_id: String,
    pub holder_name: String,
    pub holder_email: String,
    pub version: i64,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_active: bool,
    pub released_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl From<LockRow> for ResourceLock {
    fn from(row: LockRow) -> Self {
        ResourceLock {
            lock_id: row.lock_id,
            resource_id: row.resource_id,
            holder_id: row.holder_id,
            holder_info: HolderInfo {
                name: row.holder_name,
                email: row.holder_email,
            },
            version: row.version,
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            released_at: row.released_at,
        }
    }
}
