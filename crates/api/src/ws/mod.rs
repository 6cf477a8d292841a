//! WebSocket infrastructure for lock and presence propagation.
//!
//! Provides connection and room management, heartbeat monitoring, and the
//! HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::{handle_text, ws_handler};
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
