use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use coedit_core::protocol::ServerMessage;
use coedit_core::types::{ResourceId, Timestamp, UserId};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Authenticated user ID.
    pub user_id: Option<UserId>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections and their room memberships.
///
/// Connections and rooms sit behind separate `RwLock`s. Whenever both are
/// needed, `rooms` is locked before `connections`.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
    rooms: RwLock<HashMap<ResourceId, HashSet<String>>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        user_id: Option<UserId>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection and drop it from every room.
    ///
    /// Returns the rooms the connection had joined.
    pub async fn remove(&self, conn_id: &str) -> Vec<ResourceId> {
        let mut left = Vec::new();
        {
            let mut rooms = self.rooms.write().await;
            rooms.retain(|resource_id, members| {
                if members.remove(conn_id) {
                    left.push(resource_id.clone());
                }
                !members.is_empty()
            });
        }
        self.connections.write().await.remove(conn_id);
        left.sort();
        left
    }

    /// Join `conn_id` to the room of `resource_id`. Returns `false` when the
    /// connection is unknown or already a member.
    pub async fn subscribe(&self, conn_id: &str, resource_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        if !self.connections.read().await.contains_key(conn_id) {
            return false;
        }
        rooms
            .entry(resource_id.to_string())
            .or_default()
            .insert(conn_id.to_string())
    }

    /// Leave a room. Returns whether the connection was a member.
    pub async fn unsubscribe(&self, conn_id: &str, resource_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(resource_id) else {
            return false;
        };
        let removed = members.remove(conn_id);
        if members.is_empty() {
            rooms.remove(resource_id);
        }
        removed
    }

    /// Whether any connection of `user_id` is still in the room.
    pub async fn user_in_room(&self, resource_id: &str, user_id: &str) -> bool {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(resource_id) else {
            return false;
        };
        let conns = self.connections.read().await;
        members.iter().any(|conn_id| {
            conns
                .get(conn_id)
                .is_some_and(|c| c.user_id.as_deref() == Some(user_id))
        })
    }

    /// Number of connections subscribed to a room.
    pub async fn room_size(&self, resource_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(resource_id)
            .map_or(0, HashSet::len)
    }

    /// Send a message to one connection. Returns `false` if it is gone.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    /// Serialize and send a protocol message to one connection.
    pub async fn send_message(&self, conn_id: &str, message: &ServerMessage) -> bool {
        match encode(message) {
            Some(frame) => self.send_to(conn_id, frame).await,
            None => false,
        }
    }

    /// Send a message to every member of a room except `exclude`.
    ///
    /// Returns the number of connections the message was queued for.
    /// Connections whose channels are closed are skipped; they are cleaned
    /// up when their receive loop ends.
    pub async fn send_to_room(
        &self,
        resource_id: &str,
        message: Message,
        exclude: Option<&str>,
    ) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(resource_id) else {
            return 0;
        };
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn_id in members {
            if exclude == Some(conn_id.as_str()) {
                continue;
            }
            if let Some(conn) = conns.get(conn_id) {
                if conn.sender.send(message.clone()).is_ok() {
                    count += 1;
                }
            }
        }
        count
    }

    /// Broadcast a message to all connected clients.
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear both maps.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// process exits.
    pub async fn shutdown_all(&self) {
        let mut rooms = self.rooms.write().await;
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        rooms.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a protocol message as a text frame.
pub fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, kind = message.kind(), "Failed to encode WebSocket message");
            None
        }
    }
}
