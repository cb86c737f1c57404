//! Records, the unit managed by the store.
//!
//! A record is a caller payload wrapped in the lifecycle metadata the store
//! owns: identity, timestamps, and the tombstone. Callers hand the store a
//! payload and get a [`Record`] back; they never construct metadata
//! themselves.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{Result, error::ValidationError};

/// Metadata keys owned by the store. A payload may not use them.
pub const RESERVED_FIELDS: &[&str] =
  &["id", "created_at", "updated_at", "deleted", "deleted_at"];

// ─── Identity ────────────────────────────────────────────────────────────────

/// Store-assigned identity. Increases with creation order and never changes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl From<i64> for RecordId {
  fn from(value: i64) -> Self { Self(value) }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// Describes a payload type that participates in the soft-delete lifecycle.
///
/// The payload must serialise to a JSON object. Its keys may not collide with
/// [`RESERVED_FIELDS`].
pub trait RecordSchema: Serialize + DeserializeOwned + Send + Sync + 'static {
  /// Type name written to audit entries; also partitions storage.
  const RECORD_TYPE: &'static str;

  /// Fields never written into audit snapshots.
  const AUDIT_EXCLUDE: &'static [&'static str] = &[];

  /// Fields whose previous value is reported in the audit entry when an
  /// update changes them.
  const TRACKED_FIELDS: &'static [&'static str] = &[];

  fn validate(&self) -> Result<(), ValidationError> { Ok(()) }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A payload together with its lifecycle metadata.
///
/// `deleted_at` is `Some` exactly when `deleted` is true, and `updated_at` is
/// never earlier than `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
  pub id:         RecordId,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub deleted:    bool,
  pub deleted_at: Option<DateTime<Utc>>,
  pub fields:     T,
}

impl<T: RecordSchema> Record<T> {
  pub fn is_active(&self) -> bool { !self.deleted }

  pub(crate) fn from_stored(row: StoredRecord) -> Result<Self> {
    Ok(Self {
      id:         row.id,
      created_at: row.created_at,
      updated_at: row.updated_at,
      deleted:    row.deleted,
      deleted_at: row.deleted_at,
      fields:     serde_json::from_value(Value::Object(row.fields))?,
    })
  }
}

// ─── Storage rows ────────────────────────────────────────────────────────────

/// A row as the backend sees it: metadata plus the payload as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
  pub id:          RecordId,
  pub record_type: String,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
  pub deleted:     bool,
  pub deleted_at:  Option<DateTime<Utc>>,
  pub fields:      Map<String, Value>,
}

impl StoredRecord {
  /// Field-by-field dump of the persisted state, metadata included, minus
  /// every key in `exclude`.
  pub fn snapshot(&self, exclude: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".into(), Value::from(self.id.0));
    out.insert("created_at".into(), Value::from(self.created_at.to_rfc3339()));
    out.insert("updated_at".into(), Value::from(self.updated_at.to_rfc3339()));
    out.insert("deleted".into(), Value::from(self.deleted));
    out.insert(
      "deleted_at".into(),
      self
        .deleted_at
        .map(|at| Value::from(at.to_rfc3339()))
        .unwrap_or(Value::Null),
    );
    for (key, value) in &self.fields {
      out.insert(key.clone(), value.clone());
    }
    for key in exclude {
      out.remove(key);
    }
    out
  }
}

/// Input to [`crate::store::RecordBackend::insert`]. The backend assigns the
/// id; everything else is decided by the store.
#[derive(Debug, Clone)]
pub struct NewRow {
  pub record_type: &'static str,
  pub created_at:  DateTime<Utc>,
  pub fields:      Map<String, Value>,
}

/// Validate `fields` and encode them as the JSON object a backend stores.
pub(crate) fn encode_fields<T: RecordSchema>(
  fields: &T,
) -> Result<Map<String, Value>> {
  fields.validate()?;

  let map = match serde_json::to_value(fields)? {
    Value::Object(map) => map,
    _ => {
      return Err(
        ValidationError::new(
          T::RECORD_TYPE,
          "record fields must serialise to a JSON object",
        )
        .into(),
      );
    }
  };

  if let Some(key) = RESERVED_FIELDS.iter().find(|k| map.contains_key(**k)) {
    return Err(
      ValidationError::new(*key, "field name is reserved for record metadata")
        .into(),
    );
  }

  Ok(map)
}
