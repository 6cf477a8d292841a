//! Room event routing.
//!
//! [`RoomRouter`] is the only consumer of the event bus that talks to
//! sockets. It serializes each [`RoomEvent`] once and queues the frame on
//! every connection subscribed to the event's resource.

use std::sync::Arc;

use coedit_events::RoomEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::{encode, WsManager};

pub struct RoomRouter {
    ws_manager: Arc<WsManager>,
}

impl RoomRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the main routing loop.
    ///
    /// Exits when `cancel` fires or the bus is closed. A lagging receiver
    /// loses the skipped events; clients reconcile with `lock.status`.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<RoomEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Room router stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => self.route(&event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Room router lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, room router shutting down");
                        break;
                    }
                },
            }
        }
    }

    /// Deliver one event to its room.
    pub async fn route(&self, event: &RoomEvent) {
        let Some(frame) = encode(&event.message) else {
            return;
        };
        let delivered = self
            .ws_manager
            .send_to_room(&event.resource_id, frame, event.exclude_conn.as_deref())
            .await;
        tracing::trace!(
            resource_id = %event.resource_id,
            kind = event.message.kind(),
            delivered,
            "Routed room event"
        );
    }
}
