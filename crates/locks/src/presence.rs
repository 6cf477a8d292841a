//! Ephemeral cursor presence.
//!
//! The tracker owns two maps, each behind its own lock: cursor state keyed
//! by resource then user, and the last accepted update per connection for
//! rate limiting. Nothing here is persisted; a restart forgets every cursor
//! and clients repopulate it on their next move.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coedit_core::presence::{
    sanitize_color, sanitize_user_email, sanitize_user_name, CursorPosition, CursorState,
    CURSOR_IDLE_TIMEOUT_SECS, CURSOR_MIN_INTERVAL_MS,
};
use coedit_core::protocol::ServerMessage;
use coedit_core::types::{ResourceId, UserId};
use coedit_events::{EventBus, RoomEvent};
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Minimum spacing between accepted updates from one connection.
    pub min_interval: Duration,
    /// Cursors idle longer than this are purged.
    pub idle_timeout: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(CURSOR_MIN_INTERVAL_MS),
            idle_timeout: Duration::from_secs(CURSOR_IDLE_TIMEOUT_SECS),
        }
    }
}

/// A raw position update as received from a client.
#[derive(Debug, Clone)]
pub struct CursorUpdate {
    pub resource_id: ResourceId,
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub color: Option<String>,
    pub position: CursorPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    /// Stored and broadcast. Carries the sanitized state.
    Accepted(CursorState),
    /// Dropped; the connection sent too soon after its previous update.
    RateLimited { retry_after_ms: u64 },
}

pub struct PresenceTracker {
    cursors: RwLock<HashMap<ResourceId, HashMap<UserId, CursorState>>>,
    last_accepted: RwLock<HashMap<String, Instant>>,
    bus: Arc<EventBus>,
    config: PresenceConfig,
}

impl PresenceTracker {
    pub fn new(bus: Arc<EventBus>, config: PresenceConfig) -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
            last_accepted: RwLock::new(HashMap::new()),
            bus,
            config,
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Sanitize, rate-limit, store, and broadcast a cursor update.
    ///
    /// `conn_key` identifies the sending connection; the broadcast skips it
    /// so clients do not receive their own echo.
    pub async fn update_position(&self, conn_key: &str, update: CursorUpdate) -> PositionOutcome {
        {
            let now = Instant::now();
            let mut last_accepted = self.last_accepted.write().await;
            if let Some(previous) = last_accepted.get(conn_key) {
                let elapsed = now.duration_since(*previous);
                if elapsed < self.config.min_interval {
                    let retry_after = self.config.min_interval - elapsed;
                    return PositionOutcome::RateLimited {
                        retry_after_ms: retry_after.as_millis().max(1) as u64,
                    };
                }
            }
            last_accepted.insert(conn_key.to_string(), now);
        }

        let cursor = CursorState {
            color: sanitize_color(update.color.as_deref(), &update.user_id),
            resource_id: update.resource_id,
            user_id: update.user_id,
            user_name: sanitize_user_name(&update.user_name),
            user_email: sanitize_user_email(&update.user_email),
            position: update.position.clamped(),
            last_seen: Utc::now(),
        };

        self.cursors
            .write()
            .await
            .entry(cursor.resource_id.clone())
            .or_default()
            .insert(cursor.user_id.clone(), cursor.clone());

        self.bus.publish(
            RoomEvent::new(
                cursor.resource_id.clone(),
                ServerMessage::CursorUpdate {
                    resource_id: cursor.resource_id.clone(),
                    cursor: cursor.clone(),
                },
            )
            .excluding(conn_key),
        );

        PositionOutcome::Accepted(cursor)
    }

    /// Live cursors on a resource, ordered by user id.
    pub async fn list(&self, resource_id: &str) -> Vec<CursorState> {
        let cursors = self.cursors.read().await;
        let mut list: Vec<CursorState> = cursors
            .get(resource_id)
            .map(|users| users.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        list
    }

    /// Drop a user's cursor from a resource and announce it. Returns whether
    /// a cursor existed.
    pub async fn remove_user(&self, resource_id: &str, user_id: &str) -> bool {
        let removed = {
            let mut cursors = self.cursors.write().await;
            let removed = cursors
                .get_mut(resource_id)
                .and_then(|users| users.remove(user_id))
                .is_some();
            if cursors.get(resource_id).is_some_and(HashMap::is_empty) {
                cursors.remove(resource_id);
            }
            removed
        };
        if removed {
            self.publish_user_left(resource_id, user_id);
        }
        removed
    }

    /// Forget the rate-limit slot of a closed connection.
    pub async fn forget_connection(&self, conn_key: &str) {
        self.last_accepted.write().await.remove(conn_key);
    }

    /// Purge cursors idle beyond the configured timeout, announcing each as
    /// `user.left`. Returns the purged `(resource, user)` pairs.
    pub async fn purge_idle(&self) -> Vec<(ResourceId, UserId)> {
        let idle = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(CURSOR_IDLE_TIMEOUT_SECS as i64));
        let cutoff = Utc::now() - idle;

        let purged: Vec<(ResourceId, UserId)> = {
            let mut cursors = self.cursors.write().await;
            let mut purged = Vec::new();
            for (resource_id, users) in cursors.iter_mut() {
                users.retain(|user_id, cursor| {
                    let keep = cursor.last_seen >= cutoff;
                    if !keep {
                        purged.push((resource_id.clone(), user_id.clone()));
                    }
                    keep
                });
            }
            cursors.retain(|_, users| !users.is_empty());
            purged
        };

        {
            let stale_before = Instant::now().checked_sub(self.config.idle_timeout);
            if let Some(stale_before) = stale_before {
                self.last_accepted
                    .write()
                    .await
                    .retain(|_, accepted| *accepted >= stale_before);
            }
        }

        for (resource_id, user_id) in &purged {
            self.publish_user_left(resource_id, user_id);
        }
        if !purged.is_empty() {
            tracing::debug!(count = purged.len(), "Purged idle cursors");
        }
        purged
    }

    fn publish_user_left(&self, resource_id: &str, user_id: &str) {
        self.bus.publish(RoomEvent::new(
            resource_id,
            ServerMessage::UserLeft {
                resource_id: resource_id.to_string(),
                user_id: user_id.to_string(),
            },
        ));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
