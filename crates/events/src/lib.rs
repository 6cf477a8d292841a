//! coedit event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`RoomEvent`]: a [`ServerMessage`](coedit_core::protocol::ServerMessage)
//!   addressed to the room of one resource.
//!
//! The lock manager and the presence tracker publish; the room router in the
//! API crate is the single consumer that fans events out to WebSocket
//! connections.

pub mod bus;

pub use bus::{EventBus, RoomEvent};
