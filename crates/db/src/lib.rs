//! Lock and history persistence.
//!
//! The lock manager only ever talks to the [`LockStore`] and
//! [`HistoryStore`] traits. Two implementations ship here: in-process maps
//! ([`memory`]) for single-node deployments and tests, and PostgreSQL
//! repositories ([`repositories`]) for durable deployments.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::StoreError;
pub use memory::{InMemoryHistoryStore, InMemoryLockStore};
pub use repositories::{PgHistoryStore, PgLockStore};
pub use store::{HistoryStore, LockStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
