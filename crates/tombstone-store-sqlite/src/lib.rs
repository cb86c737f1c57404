//! SQLite backend for the tombstone record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The same connection serves the
//! record table and the append-only audit table.

mod audit;
mod encode;
mod schema;
mod store;

pub mod config;
pub mod error;

pub use audit::SqliteAuditSink;
pub use crate::config::{SqliteRecordStore, StoreConfig, open};
pub use error::{Error, Result};
pub use store::SqliteBackend;

#[cfg(test)]
mod tests;
