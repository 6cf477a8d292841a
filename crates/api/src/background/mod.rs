//! Background tasks and scheduled jobs.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. All tasks accept a [`CancellationToken`]
//! for graceful shutdown.

pub mod cursor_sweep;
pub mod history_retention;
pub mod lock_expiry;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::notifications::RoomRouter;
use crate::state::AppState;
use crate::ws;

/// Spawn the room router, the WebSocket heartbeat, and every sweep. All of
/// them stop when `cancel` fires.
pub fn spawn_all(state: &AppState, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
    let settings = &state.config.locks;

    let router = RoomRouter::new(Arc::clone(&state.ws_manager));
    vec![
        tokio::spawn(router.run(state.event_bus.subscribe(), cancel.clone())),
        ws::start_heartbeat(Arc::clone(&state.ws_manager), cancel.clone()),
        tokio::spawn(lock_expiry::run(
            Arc::clone(&state.lock_manager),
            settings.lock_sweep_interval(),
            cancel.clone(),
        )),
        tokio::spawn(cursor_sweep::run(
            Arc::clone(&state.presence),
            settings.cursor_sweep_interval(),
            cancel.clone(),
        )),
        tokio::spawn(history_retention::run(
            state.history.clone(),
            settings.history_retention_days,
            cancel.clone(),
        )),
    ]
}
