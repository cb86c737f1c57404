//! Core types for the tombstone record store.
//!
//! Records are soft-deleted rather than removed, visible through one of three
//! fixed views, and every persisted mutation is reported to an audit sink.
//! This crate holds the lifecycle rules and the traits backends implement;
//! it has no database dependencies of its own.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod query;
pub mod record;
pub mod settings;
pub mod store;
pub mod view;

pub use audit::{
  AuditAction, AuditEntry, AuditError, AuditSink, AuditWriteWarning,
  MemorySink, MutationContext, Origin, TracingSink,
};
pub use error::{Error, Result, ValidationError};
pub use lifecycle::{AuditMode, RecordStore};
pub use memory::MemoryBackend;
pub use query::Query;
pub use record::{Record, RecordId, RecordSchema, StoredRecord};
pub use settings::{AuditFailurePolicy, StoreSettings};
pub use store::RecordBackend;
pub use view::{OrderBy, View};
