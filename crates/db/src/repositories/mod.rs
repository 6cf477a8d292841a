//! PostgreSQL implementations of the store traits.

pub mod history_repo;
pub mod lock_repo;

pub use history_repo::PgHistoryStore;
pub use lock_repo::PgLockStore;
