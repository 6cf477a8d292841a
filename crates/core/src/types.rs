/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque identifier of a lockable resource (an appointment id).
pub type ResourceId = String;

/// User identifier as issued by the identity collaborator.
pub type UserId = String;
