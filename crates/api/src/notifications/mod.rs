//! Fan-out of room events to WebSocket subscribers.

pub mod router;

pub use router::RoomRouter;
