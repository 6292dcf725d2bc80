//! Per-user persistent session data: language preference and daily usage.

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteSessionStore;
pub use store::{SessionStore, UserRecord};
