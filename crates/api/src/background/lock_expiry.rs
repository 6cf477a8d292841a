//! Periodic expiry of elapsed leases.
//!
//! Reads already expire elapsed leases lazily; this sweep makes sure an
//! abandoned lock is announced and recorded even if nobody touches the
//! resource again.

use std::sync::Arc;
use std::time::Duration;

use coedit_locks::LockManager;
use tokio_util::sync::CancellationToken;

/// Run the lock expiry loop until `cancel` is triggered.
pub async fn run(manager: Arc<LockManager>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Lock expiry sweep started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock expiry sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match manager.expire_elapsed().await {
                    Ok(0) => tracing::trace!("Lock expiry sweep: nothing elapsed"),
                    Ok(expired) => tracing::info!(expired, "Lock expiry sweep: expired leases"),
                    Err(e) => tracing::error!(error = %e, "Lock expiry sweep failed"),
                }
            }
        }
    }
}
