pub mod lock;
pub mod lock_event;
