//! Periodic purge of idle cursors.

use std::sync::Arc;
use std::time::Duration;

use coedit_locks::PresenceTracker;
use tokio_util::sync::CancellationToken;

/// Run the cursor idle sweep until `cancel` is triggered.
pub async fn run(presence: Arc<PresenceTracker>, every: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = every.as_secs(),
        idle_timeout_secs = presence.config().idle_timeout.as_secs(),
        "Cursor sweep started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cursor sweep stopping");
                break;
            }
            _ = interval.tick() => {
                presence.purge_idle().await;
            }
        }
    }
}
