//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`RoomEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.
//! A single channel carries every resource's events, so events published
//! from one task are received in publish order.

use chrono::{DateTime, Utc};
use coedit_core::protocol::ServerMessage;
use coedit_core::types::ResourceId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// RoomEvent
// ---------------------------------------------------------------------------

/// A message addressed to every subscriber of one resource.
///
/// Constructed via [`RoomEvent::new`] and optionally narrowed with
/// [`excluding`](RoomEvent::excluding).
#[derive(Debug, Clone, Serialize)]
pub struct RoomEvent {
    /// The room (resource) the message is delivered to.
    pub resource_id: ResourceId,

    /// The message pushed to subscribers.
    pub message: ServerMessage,

    /// Connection that should not receive its own echo (cursor moves).
    pub exclude_conn: Option<String>,

    /// When the event was published (UTC).
    pub timestamp: DateTime<Utc>,
}

impl RoomEvent {
    pub fn new(resource_id: impl Into<ResourceId>, message: ServerMessage) -> Self {
        Self {
            resource_id: resource_id.into(),
            message,
            exclude_conn: None,
            timestamp: Utc::now(),
        }
    }

    /// Skip delivery to the given connection.
    pub fn excluding(mut self, conn_id: impl Into<String>) -> Self {
        self.exclude_conn = Some(conn_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`RoomEvent`].
///
/// # Usage
///
/// ```rust
/// use coedit_core::protocol::ServerMessage;
/// use coedit_events::bus::{EventBus, RoomEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(RoomEvent::new(
///     "A1",
///     ServerMessage::UserLeft { resource_id: "A1".into(), user_id: "u1".into() },
/// ));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`. Delivery is
    /// therefore at-most-once; clients reconcile through a status query.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Never blocks. If there are no active subscribers the event is
    /// silently dropped.
    pub fn publish(&self, event: RoomEvent) {
        tracing::trace!(
            resource_id = %event.resource_id,
            kind = event.message.kind(),
            "Publishing room event"
        );
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
