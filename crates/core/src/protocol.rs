//! WebSocket message protocol for lock and presence propagation.
//!
//! Serialized as JSON with an internally-tagged `"type"` discriminator so
//! that the frontend can route messages by type string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lock::ResourceLock;
use crate::presence::{CursorPosition, CursorState};
use crate::types::{ResourceId, UserId};

/// Messages a client sends over its duplex channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join the room of a resource.
    #[serde(rename = "subscribe")]
    Subscribe { resource_id: ResourceId },

    /// Leave the room of a resource.
    #[serde(rename = "unsubscribe")]
    Unsubscribe { resource_id: ResourceId },

    /// Move this user's cursor on a resource.
    #[serde(rename = "cursor.move")]
    CursorMove {
        resource_id: ResourceId,
        position: CursorPosition,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        expected_version: Option<i64>,
    },

    /// Ask for the current lock status of a resource.
    #[serde(rename = "lock.status")]
    LockStatus { resource_id: ResourceId },
}

/// Messages the server pushes to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A new lease was granted.
    #[serde(rename = "lock.acquired")]
    LockAcquired {
        resource_id: ResourceId,
        lock: ResourceLock,
    },

    /// A lease ended by release or force-release.
    #[serde(rename = "lock.released")]
    LockReleased {
        resource_id: ResourceId,
        lock_id: Uuid,
        version: i64,
        previous_holder: UserId,
        released_by: UserId,
        forced: bool,
    },

    /// The current holder refreshed the lease.
    #[serde(rename = "lock.updated")]
    LockUpdated {
        resource_id: ResourceId,
        lock: ResourceLock,
    },

    /// A lease ran past its expiry and was reclaimed.
    #[serde(rename = "lock.expired")]
    LockExpired {
        resource_id: ResourceId,
        lock_id: Uuid,
        version: i64,
        previous_holder: UserId,
    },

    /// An administrator took the lock over.
    #[serde(rename = "lock.admin_takeover")]
    AdminTakeover {
        resource_id: ResourceId,
        lock: ResourceLock,
        previous_holder: Option<UserId>,
    },

    /// Snapshot of the lock state, sent on subscribe and on request.
    #[serde(rename = "lock.status")]
    LockStatus {
        resource_id: ResourceId,
        lock: Option<ResourceLock>,
        remaining_seconds: Option<i64>,
    },

    /// A user's cursor moved.
    #[serde(rename = "cursor.update")]
    CursorUpdate {
        resource_id: ResourceId,
        cursor: CursorState,
    },

    /// A user's cursor went idle or their connection closed.
    #[serde(rename = "user.left")]
    UserLeft {
        resource_id: ResourceId,
        user_id: UserId,
    },

    /// Reply to a client message that could not be handled.
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerMessage {
    /// The resource this message belongs to, if any.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            ServerMessage::LockAcquired { resource_id, .. }
            | ServerMessage::LockReleased { resource_id, .. }
            | ServerMessage::LockUpdated { resource_id, .. }
            | ServerMessage::LockExpired { resource_id, .. }
            | ServerMessage::AdminTakeover { resource_id, .. }
            | ServerMessage::LockStatus { resource_id, .. }
            | ServerMessage::CursorUpdate { resource_id, .. }
            | ServerMessage::UserLeft { resource_id, .. } => Some(resource_id),
            ServerMessage::Error { .. } => None,
        }
    }

    /// The wire `"type"` string of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::LockAcquired { .. } => "lock.acquired",
            ServerMessage::LockReleased { .. } => "lock.released",
            ServerMessage::LockUpdated { .. } => "lock.updated",
            ServerMessage::LockExpired { .. } => "lock.expired",
            ServerMessage::AdminTakeover { .. } => "lock.admin_takeover",
            ServerMessage::LockStatus { .. } => "lock.status",
            ServerMessage::CursorUpdate { .. } => "cursor.update",
            ServerMessage::UserLeft { .. } => "user.left",
            ServerMessage::Error { .. } => "error",
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
