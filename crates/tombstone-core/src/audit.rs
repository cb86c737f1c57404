//! Audit entries and the sinks that receive them.
//!
//! Every persisted mutation except a hard delete produces exactly one
//! [`AuditEntry`]. Entries are handed to an [`AuditSink`]; what happens to
//! them afterwards (indexing, retention) is the sink's business. The store
//! never mutates or removes an entry it has emitted.

use std::{
  collections::BTreeMap,
  fmt,
  future::Future,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::record::RecordId;

// ─── Action ──────────────────────────────────────────────────────────────────

/// What a mutation did, as seen from the record's state after it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuditAction {
  Created,
  Updated,
  Deleted,
}

/// Whether the persist wrote a new row or rewrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Inserted,
  Rewritten,
}

impl AuditAction {
  /// Decide the action from the state the record is left in.
  ///
  /// A rewrite of a tombstoned record is always `deleted`, even when the
  /// caller only touched payload fields.
  pub fn resolve(transition: Transition, deleted: bool) -> Self {
    match (transition, deleted) {
      (Transition::Inserted, _) => Self::Created,
      (Transition::Rewritten, true) => Self::Deleted,
      (Transition::Rewritten, false) => Self::Updated,
    }
  }
}

// ─── Origin & context ────────────────────────────────────────────────────────

/// Tag naming the channel that triggered a mutation. Never persisted on the
/// record itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
  pub const ADMIN: &'static str = "admin";
  pub const API: &'static str = "api";

  pub fn new(tag: impl Into<String>) -> Self { Self(tag.into()) }

  pub fn admin() -> Self { Self::new(Self::ADMIN) }

  pub fn api() -> Self { Self::new(Self::API) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Origin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Caller-supplied provenance for a mutating call, copied verbatim into the
/// audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationContext {
  pub origin: Option<Origin>,
  pub actor:  Option<String>,
}

impl MutationContext {
  pub fn new() -> Self { Self::default() }

  pub fn admin() -> Self { Self::new().with_origin(Origin::admin()) }

  pub fn api() -> Self { Self::new().with_origin(Origin::api()) }

  pub fn with_origin(mut self, origin: Origin) -> Self {
    self.origin = Some(origin);
    self
  }

  pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
    self.actor = Some(actor.into());
    self
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// Previous and new value of a tracked field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
  pub from: Value,
  pub to:   Value,
}

/// An immutable log record describing one persisted mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub entry_id:    Uuid,
  pub action:      AuditAction,
  pub origin:      Option<Origin>,
  pub actor:       Option<String>,
  pub record_type: String,
  pub record_id:   RecordId,
  /// Persisted state at the time of the mutation, minus excluded fields.
  pub snapshot:    Map<String, Value>,
  /// Tracked fields changed by this mutation. Empty for creates.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub changes:     BTreeMap<String, FieldChange>,
  pub recorded_at: DateTime<Utc>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuditError {
  #[error("failed to encode audit entry: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("audit sink error: {0}")]
  Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AuditError {
  pub fn sink<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Sink(Box::new(err))
  }
}

/// A failed audit append that did not fail the mutation it describes.
#[derive(Debug)]
pub struct AuditWriteWarning {
  pub entry: AuditEntry,
  pub error: AuditError,
}

// ─── Sink trait ──────────────────────────────────────────────────────────────

/// Destination for audit entries.
///
/// Appends run synchronously inside the mutating call, after the record has
/// been persisted.
pub trait AuditSink: Send + Sync {
  fn append<'a>(
    &'a self,
    entry: &'a AuditEntry,
  ) -> impl Future<Output = Result<(), AuditError>> + Send + 'a;
}

/// `None` swallows entries; handy for optional secondary sinks.
impl<A: AuditSink> AuditSink for Option<A> {
  async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
    match self {
      Some(sink) => sink.append(entry).await,
      None => Ok(()),
    }
  }
}

/// Fan out to both sinks. Both are always attempted; the first error wins.
impl<A: AuditSink, B: AuditSink> AuditSink for (A, B) {
  async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
    let first = self.0.append(entry).await;
    let second = self.1.append(entry).await;
    first.and(second)
  }
}

// ─── Built-in sinks ──────────────────────────────────────────────────────────

/// Emits each entry as a structured `tracing` event on the `activity`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
  async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
    let snapshot = serde_json::to_string(&entry.snapshot)?;
    let changes = serde_json::to_string(&entry.changes)?;

    tracing::info!(
      target: "activity",
      entry_id    = %entry.entry_id,
      action      = %entry.action,
      origin      = entry.origin.as_ref().map(Origin::as_str),
      actor       = entry.actor.as_deref(),
      record_type = %entry.record_type,
      record_id   = entry.record_id.0,
      snapshot    = %snapshot,
      changes     = %changes,
      "record {}",
      entry.action,
    );
    Ok(())
  }
}

/// Keeps entries in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
  entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemorySink {
  pub fn new() -> Self { Self::default() }

  /// A copy of every entry appended so far, oldest first.
  pub fn entries(&self) -> Vec<AuditEntry> {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl AuditSink for MemorySink {
  async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(entry.clone());
    Ok(())
  }
}
