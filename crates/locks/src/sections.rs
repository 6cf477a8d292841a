//! Per-key mutual exclusion.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of independent async mutexes, one per key.
///
/// Holders of different keys never wait on each other. Entries are created
/// on first use and dropped by [`prune`](KeyedSections::prune) once nobody
/// holds or waits on them.
#[derive(Default)]
pub struct KeyedSections {
    sections: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedSections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Access lasts until the returned
    /// guard is dropped.
    pub async fn enter(&self, key: &str) -> OwnedMutexGuard<()> {
        let section = {
            let mut sections = self.sections.lock().await;
            Arc::clone(sections.entry(key.to_string()).or_default())
        };
        section.lock_owned().await
    }

    /// Drop sections nobody holds or waits on. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut sections = self.sections.lock().await;
        let before = sections.len();
        // The map's own reference is the only one left for idle sections.
        sections.retain(|_, section| Arc::strong_count(section) > 1);
        before - sections.len()
    }

    pub async fn len(&self) -> usize {
        self.sections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sections.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let sections = Arc::new(KeyedSections::new());
        let guard = sections.enter("A1").await;

        let contender = {
            let sections = Arc::clone(&sections);
            tokio::spawn(async move {
                let _g = sections.enter("A1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let sections = KeyedSections::new();
        let _a = sections.enter("A1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), sections.enter("B2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn prune_keeps_held_sections() {
        let sections = KeyedSections::new();
        let held = sections.enter("A1").await;
        drop(sections.enter("B2").await);

        assert_eq!(sections.len().await, 2);
        assert_eq!(sections.prune().await, 1);
        assert_eq!(sections.len().await, 1);

        drop(held);
        assert_eq!(sections.prune().await, 1);
        assert!(sections.is_empty().await);
    }
}
