//! Store traits consumed by the lock manager and history recorder.

use async_trait::async_trait;
use coedit_core::history::LockEvent;
use coedit_core::lock::ResourceLock;
use coedit_core::types::Timestamp;

use crate::error::StoreError;

/// Durable keyed map of resource id → lock record.
///
/// [`compare_and_swap`](LockStore::compare_and_swap) is the only mutation.
/// Callers read the current record, decide, and then attempt a single swap;
/// a `false` result means somebody else changed the record in between and
/// nothing was written.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Fetch the record for a resource (active or not).
    async fn get(&self, resource_id: &str) -> Result<Option<ResourceLock>, StoreError>;

    /// Replace the record for `resource_id` with `new` if and only if the
    /// stored record still equals `expected` (`None` = no record yet).
    async fn compare_and_swap(
        &self,
        resource_id: &str,
        expected: Option<&ResourceLock>,
        new: &ResourceLock,
    ) -> Result<bool, StoreError>;

    /// Active records whose lease has elapsed at `now`.
    async fn list_elapsed(&self, now: Timestamp) -> Result<Vec<ResourceLock>, StoreError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Append-only log of [`LockEvent`]s.
///
/// List operations return newest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(&self, event: &LockEvent) -> Result<(), StoreError>;

    async fn list_for_resource(
        &self,
        resource_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LockEvent>, StoreError>;

    async fn count_for_resource(&self, resource_id: &str) -> Result<i64, StoreError>;

    /// Events where the user acted or was named as `released_by`.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LockEvent>, StoreError>;

    async fn count_for_user(&self, user_id: &str) -> Result<i64, StoreError>;

    async fn list_recent(&self, limit: i64) -> Result<Vec<LockEvent>, StoreError>;

    /// Every event of a resource, used for statistics.
    async fn all_for_resource(&self, resource_id: &str) -> Result<Vec<LockEvent>, StoreError>;

    /// Retention cleanup. Returns the number of deleted events.
    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}
