//! In-process store implementations.
//!
//! Both stores keep their state behind a `tokio::sync::RwLock`; every
//! mutation happens under the write guard, which makes the compare and the
//! swap a single atomic step.

use std::collections::HashMap;

use async_trait::async_trait;
use coedit_core::history::LockEvent;
use coedit_core::lock::ResourceLock;
use coedit_core::types::Timestamp;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{HistoryStore, LockStore};

// ---------------------------------------------------------------------------
// InMemoryLockStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryLockStore {
    records: RwLock<HashMap<String, ResourceLock>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources that have a record (active or not).
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn get(&self, resource_id: &str) -> Result<Option<ResourceLock>, StoreError> {
        Ok(self.records.read().await.get(resource_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        resource_id: &str,
        expected: Option<&ResourceLock>,
        new: &ResourceLock,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        if records.get(resource_id) != expected {
            return Ok(false);
        }
        records.insert(resource_id.to_string(), new.clone());
        Ok(true)
    }

    async fn list_elapsed(&self, now: Timestamp) -> Result<Vec<ResourceLock>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|lock| lock.is_elapsed_at(now))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryHistoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryHistoryStore {
    events: RwLock<Vec<LockEvent>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select matching events newest first, then apply offset/limit.
    async fn select<F>(&self, filter: F, limit: i64, offset: i64) -> Vec<LockEvent>
    where
        F: Fn(&LockEvent) -> bool,
    {
        let events = self.events.read().await;
        let mut matching: Vec<&LockEvent> = events.iter().filter(|e| filter(e)).collect();
        matching.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect()
    }

    async fn count<F>(&self, filter: F) -> i64
    where
        F: Fn(&LockEvent) -> bool,
    {
        self.events.read().await.iter().filter(|e| filter(e)).count() as i64
    }
}

fn involves_user(event: &LockEvent, user_id: &str) -> bool {
    event.actor_id == user_id || event.released_by.as_deref() == Some(user_id)
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn insert(&self, event: &LockEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn list_for_resource(
        &self,
        resource_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LockEvent>, StoreError> {
        Ok(self
            .select(|e| e.resource_id == resource_id, limit, offset)
            .await)
    }

    async fn count_for_resource(&self, resource_id: &str) -> Result<i64, StoreError> {
        Ok(self.count(|e| e.resource_id == resource_id).await)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LockEvent>, StoreError> {
        Ok(self.select(|e| involves_user(e, user_id), limit, offset).await)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(self.count(|e| involves_user(e, user_id)).await)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<LockEvent>, StoreError> {
        Ok(self.select(|_| true, limit, 0).await)
    }

    async fn all_for_resource(&self, resource_id: &str) -> Result<Vec<LockEvent>, StoreError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.resource_id == resource_id)
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use coedit_core::history::LockAction;
    use coedit_core::lock::HolderInfo;

    use super::*;

    fn lock(version: i64) -> ResourceLock {
        ResourceLock::new(
            "A1",
            "u1",
            HolderInfo::new("Ada", ""),
            version,
            Utc::now(),
            Duration::seconds(300),
        )
    }

    #[tokio::test]
    async fn first_write_requires_absent_record() {
        let store = InMemoryLockStore::new();
        let first = lock(1);

        assert!(store.compare_and_swap("A1", None, &first).await.unwrap());
        assert!(!store.compare_and_swap("A1", None, &lock(1)).await.unwrap());
        assert_eq!(store.get("A1").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn swap_fails_against_stale_expectation() {
        let store = InMemoryLockStore::new();
        let first = lock(1);
        store.compare_and_swap("A1", None, &first).await.unwrap();

        let second = first.refreshed(Utc::now(), Duration::seconds(300));
        assert!(store
            .compare_and_swap("A1", Some(&first), &second)
            .await
            .unwrap());

        // `first` is stale now.
        let third = first.ended(Utc::now());
        assert!(!store
            .compare_and_swap("A1", Some(&first), &third)
            .await
            .unwrap());
        assert_eq!(store.get("A1").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn list_elapsed_skips_inactive_and_live_records() {
        let store = InMemoryLockStore::new();
        let now = Utc::now();
        let live = lock(1);
        let mut stale = lock(3);
        stale.resource_id = "B2".into();
        stale.expires_at = now - Duration::seconds(1);
        let mut ended = lock(2);
        ended.resource_id = "C3".into();
        ended.expires_at = now - Duration::seconds(1);
        let ended = ended.ended(now);

        store.compare_and_swap("A1", None, &live).await.unwrap();
        store.compare_and_swap("B2", None, &stale).await.unwrap();
        store.compare_and_swap("C3", None, &ended).await.unwrap();

        let elapsed = store.list_elapsed(now).await.unwrap();
        assert_eq!(elapsed.len(), 1);
        assert_eq!(elapsed[0].resource_id, "B2");
    }

    fn history_event(resource: &str, actor: &str, secs_ago: i64) -> LockEvent {
        LockEvent::new(
            LockAction::Acquired,
            resource,
            actor,
            &HolderInfo::new(actor, ""),
            Utc::now() - Duration::seconds(secs_ago),
        )
    }

    #[tokio::test]
    async fn history_lists_newest_first_with_pagination() {
        let store = InMemoryHistoryStore::new();
        for secs_ago in [30, 10, 20] {
            store
                .insert(&history_event("A1", "u1", secs_ago))
                .await
                .unwrap();
        }
        store.insert(&history_event("B2", "u1", 5)).await.unwrap();

        let page = store.list_for_resource("A1", 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].timestamp > page[1].timestamp);

        let rest = store.list_for_resource("A1", 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(store.count_for_resource("A1").await.unwrap(), 3);
        assert_eq!(store.list_recent(1).await.unwrap()[0].resource_id, "B2");
    }

    #[tokio::test]
    async fn user_history_includes_released_by() {
        let store = InMemoryHistoryStore::new();
        store.insert(&history_event("A1", "u1", 10)).await.unwrap();
        let forced = LockEvent::new(
            LockAction::ForceReleased,
            "A1",
            "u1",
            &HolderInfo::default(),
            Utc::now(),
        )
        .with_released_by("admin");
        store.insert(&forced).await.unwrap();

        assert_eq!(store.count_for_user("u1").await.unwrap(), 2);
        assert_eq!(store.count_for_user("admin").await.unwrap(), 1);
        assert_eq!(
            store.list_for_user("admin", 10, 0).await.unwrap()[0].action,
            LockAction::ForceReleased
        );
    }

    #[tokio::test]
    async fn delete_older_than_removes_only_old_events() {
        let store = InMemoryHistoryStore::new();
        store.insert(&history_event("A1", "u1", 3600)).await.unwrap();
        store.insert(&history_event("A1", "u1", 1)).await.unwrap();

        let deleted = store
            .delete_older_than(Utc::now() - Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_for_resource("A1").await.unwrap(), 1);
    }
}
