//! Shared fixtures for lock manager tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use coedit_core::lock::HolderInfo;
use coedit_db::{HistoryStore, InMemoryHistoryStore, InMemoryLockStore, LockStore};
use coedit_events::{EventBus, RoomEvent};
use coedit_locks::{HistoryRecorder, LockManager, LockManagerConfig, Requester};
use tokio::sync::broadcast;

/// A lock manager over in-memory stores, with handles to inspect them.
pub struct Harness {
    pub manager: Arc<LockManager>,
    pub history: Arc<InMemoryHistoryStore>,
    pub bus: Arc<EventBus>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(300))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let history = Arc::new(InMemoryHistoryStore::new());
        Self::with_history(ttl, Arc::clone(&history) as Arc<dyn HistoryStore>, history)
    }

    pub fn with_history(
        ttl: Duration,
        store: Arc<dyn HistoryStore>,
        history: Arc<InMemoryHistoryStore>,
    ) -> Self {
        Self::build(ttl, Arc::new(InMemoryLockStore::new()), store, history)
    }

    /// Harness over a caller-supplied lock store.
    pub fn with_lock_store(ttl: Duration, locks: Arc<dyn LockStore>) -> Self {
        let history = Arc::new(InMemoryHistoryStore::new());
        Self::build(
            ttl,
            locks,
            Arc::clone(&history) as Arc<dyn HistoryStore>,
            history,
        )
    }

    fn build(
        ttl: Duration,
        locks: Arc<dyn LockStore>,
        store: Arc<dyn HistoryStore>,
        history: Arc<InMemoryHistoryStore>,
    ) -> Self {
        let bus = Arc::new(EventBus::default());
        let manager = Arc::new(LockManager::new(
            locks,
            HistoryRecorder::new(store),
            Arc::clone(&bus),
            LockManagerConfig { ttl },
        ));
        Self {
            manager,
            history,
            bus,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.bus.subscribe()
    }
}

pub fn user(id: &str) -> Requester {
    Requester::new(id, HolderInfo::new(format!("User {id}"), format!("{id}@example.com")))
}

/// Drain every event currently buffered on `rx` and return their kinds.
pub fn drain_kinds(rx: &mut broadcast::Receiver<RoomEvent>) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.message.kind());
    }
    kinds
}
