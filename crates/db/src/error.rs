/// Failure of a lock or history store.
///
/// Every variant is treated as transient by callers: the store guarantees
/// that a failed write left no partial state behind, so the operation can be
/// retried as a whole.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
