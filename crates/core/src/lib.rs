//! Domain types shared by every coedit crate.
//!
//! Nothing in here touches the network, the database, or the async runtime:
//! the store, the lock manager, and the HTTP/WebSocket layer all build on
//! these definitions so that lock semantics, history records, cursor
//! validation, and the wire protocol have a single source of truth.

pub mod error;
pub mod history;
pub mod lock;
pub mod pagination;
pub mod presence;
pub mod protocol;
pub mod types;
