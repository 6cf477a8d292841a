//! Lock coordination services.
//!
//! - [`LockManager`]: the only writer of the lock store. Serializes every
//!   mutation of a resource through a per-resource section, commits with a
//!   single compare-and-swap, and publishes exactly one room event per
//!   committed mutation.
//! - [`HistoryRecorder`]: append-only lifecycle log plus paginated queries
//!   and statistics. Write failures are logged, never surfaced.
//! - [`PresenceTracker`]: ephemeral, rate-limited cursor state.

pub mod history;
pub mod manager;
pub mod presence;
pub mod sections;

pub use history::HistoryRecorder;
pub use manager::{
    AcquireOutcome, ForceReleaseOutcome, HeartbeatOutcome, LockManager, LockManagerConfig,
    LockStatus, ReleaseOutcome, Requester, TakeoverOutcome,
};
pub use presence::{CursorUpdate, PositionOutcome, PresenceConfig, PresenceTracker};
pub use sections::KeyedSections;
