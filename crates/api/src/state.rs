use std::sync::Arc;

use coedit_db::{HistoryStore, InMemoryHistoryStore, InMemoryLockStore, LockStore};
use coedit_events::EventBus;
use coedit_locks::{HistoryRecorder, LockManager, PresenceTracker};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The only writer of lock records.
    pub lock_manager: Arc<LockManager>,
    /// Ephemeral cursor state.
    pub presence: Arc<PresenceTracker>,
    /// History writes and queries.
    pub history: HistoryRecorder,
    /// WebSocket connections and room membership.
    pub ws_manager: Arc<WsManager>,
    /// Room events published by the lock manager and presence tracker.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the services together over the given stores.
    pub fn new(
        config: ServerConfig,
        lock_store: Arc<dyn LockStore>,
        history_store: Arc<dyn HistoryStore>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let history = HistoryRecorder::new(history_store);
        let lock_manager = Arc::new(LockManager::new(
            lock_store,
            history.clone(),
            Arc::clone(&event_bus),
            config.locks.manager_config(),
        ));
        let presence = Arc::new(PresenceTracker::new(
            Arc::clone(&event_bus),
            config.locks.presence_config(),
        ));

        Self {
            config: Arc::new(config),
            lock_manager,
            presence,
            history,
            ws_manager: Arc::new(WsManager::new()),
            event_bus,
        }
    }

    /// State backed by process-local stores.
    pub fn in_memory(config: ServerConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryLockStore::new()),
            Arc::new(InMemoryHistoryStore::new()),
        )
    }
}
