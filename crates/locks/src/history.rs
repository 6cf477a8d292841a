//! History recording and queries.

use std::sync::Arc;

use coedit_core::history::{compute_statistics, LockEvent, LockStatistics};
use coedit_core::pagination::{
    clamp_limit, clamp_offset, Page, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
use coedit_core::types::Timestamp;
use coedit_db::{HistoryStore, StoreError};

/// Front end to a [`HistoryStore`].
///
/// Writing never fails from the caller's point of view: the lock operation
/// that produced an event has already committed, so a failed insert is
/// logged and dropped.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, event: LockEvent) {
        if let Err(e) = self.store.insert(&event).await {
            tracing::error!(
                error = %e,
                resource_id = %event.resource_id,
                action = %event.action,
                event_id = %event.id,
                "Failed to record lock event"
            );
        }
    }

    pub async fn history(
        &self,
        resource_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Page<LockEvent>, StoreError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let offset = clamp_offset(offset);
        let items = self
            .store
            .list_for_resource(resource_id, limit, offset)
            .await?;
        let total = self.store.count_for_resource(resource_id).await?;
        Ok(Page::new(items, total))
    }

    pub async fn user_history(
        &self,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Page<LockEvent>, StoreError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let offset = clamp_offset(offset);
        let items = self.store.list_for_user(user_id, limit, offset).await?;
        let total = self.store.count_for_user(user_id).await?;
        Ok(Page::new(items, total))
    }

    pub async fn recent_activity(&self, limit: Option<i64>) -> Result<Vec<LockEvent>, StoreError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        self.store.list_recent(limit).await
    }

    pub async fn statistics(&self, resource_id: &str) -> Result<LockStatistics, StoreError> {
        let events = self.store.all_for_resource(resource_id).await?;
        Ok(compute_statistics(resource_id, &events))
    }

    /// Retention cleanup: delete every event older than `cutoff`.
    pub async fn cleanup_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let deleted = self.store.delete_older_than(cutoff).await?;
        tracing::info!(deleted, cutoff = %cutoff, "Lock history cleanup");
        Ok(deleted)
    }
}
