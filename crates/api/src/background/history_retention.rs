//! Periodic cleanup of old lock history.
//!
//! Deletes lock events older than the configured retention period. Runs on
//! a fixed interval using `tokio::time::interval`.

use std::time::Duration;

use chrono::Utc;
use coedit_locks::HistoryRecorder;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the history retention loop until `cancel` is triggered.
pub async fn run(history: HistoryRecorder, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "History retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("History retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                match history.cleanup_older_than(cutoff).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "History retention: purged old events");
                    }
                    Ok(_) => tracing::debug!("History retention: no events to purge"),
                    Err(e) => tracing::error!(error = %e, "History retention: cleanup failed"),
                }
            }
        }
    }
}
