//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Payloads, snapshots and
//! change maps are stored as compact JSON. Entry UUIDs are stored as
//! hyphenated lowercase strings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tombstone_core::{
  AuditAction, AuditEntry, Origin, RecordId, StoredRecord, audit::FieldChange,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_action(s: &str) -> Result<AuditAction> {
  s.parse().map_err(|_| Error::Corrupt {
    column: "action",
    value:  s.to_owned(),
  })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_object(map: &Map<String, Value>) -> Result<String> {
  Ok(serde_json::to_string(map)?)
}

pub fn decode_object(column: &'static str, s: &str) -> Result<Map<String, Value>> {
  match serde_json::from_str(s)? {
    Value::Object(map) => Ok(map),
    _ => Err(Error::Corrupt { column, value: s.to_owned() }),
  }
}

pub fn encode_changes(changes: &BTreeMap<String, FieldChange>) -> Result<String> {
  Ok(serde_json::to_string(changes)?)
}

pub fn decode_changes(s: &str) -> Result<BTreeMap<String, FieldChange>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `records` row.
pub struct RawRecord {
  pub id:          i64,
  pub record_type: String,
  pub created_at:  String,
  pub updated_at:  String,
  pub deleted:     bool,
  pub deleted_at:  Option<String>,
  pub fields_json: String,
}

impl RawRecord {
  /// Column list matching [`RawRecord::from_row`].
  pub const COLUMNS: &'static str =
    "id, record_type, created_at, updated_at, deleted, deleted_at, fields_json";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      record_type: row.get(1)?,
      created_at:  row.get(2)?,
      updated_at:  row.get(3)?,
      deleted:     row.get(4)?,
      deleted_at:  row.get(5)?,
      fields_json: row.get(6)?,
    })
  }

  pub fn into_stored(self) -> Result<StoredRecord> {
    Ok(StoredRecord {
      id:          RecordId(self.id),
      record_type: self.record_type,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
      deleted:     self.deleted,
      deleted_at:  self.deleted_at.as_deref().map(decode_dt).transpose()?,
      fields:      decode_object("fields_json", &self.fields_json)?,
    })
  }
}

/// Raw values read directly from an `audit_entries` row.
pub struct RawAuditEntry {
  pub entry_id:      String,
  pub action:        String,
  pub origin:        Option<String>,
  pub actor:         Option<String>,
  pub record_type:   String,
  pub record_id:     i64,
  pub snapshot_json: String,
  pub changes_json:  String,
  pub recorded_at:   String,
}

impl RawAuditEntry {
  pub const COLUMNS: &'static str = "entry_id, action, origin, actor, record_type, \
                                     record_id, snapshot_json, changes_json, recorded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:      row.get(0)?,
      action:        row.get(1)?,
      origin:        row.get(2)?,
      actor:         row.get(3)?,
      record_type:   row.get(4)?,
      record_id:     row.get(5)?,
      snapshot_json: row.get(6)?,
      changes_json:  row.get(7)?,
      recorded_at:   row.get(8)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      entry_id:    decode_uuid(&self.entry_id)?,
      action:      decode_action(&self.action)?,
      origin:      self.origin.map(Origin::new),
      actor:       self.actor,
      record_type: self.record_type,
      record_id:   RecordId(self.record_id),
      snapshot:    decode_object("snapshot_json", &self.snapshot_json)?,
      changes:     decode_changes(&self.changes_json)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_survive_the_text_column() {
    let now = Utc::now();
    assert_eq!(decode_dt(&encode_dt(now)).unwrap(), now);
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }

  #[test]
  fn non_object_payload_is_corrupt() {
    let err = decode_object("fields_json", "[1, 2]").unwrap_err();
    assert!(matches!(err, Error::Corrupt { column: "fields_json", .. }));
  }

  #[test]
  fn unknown_action_is_corrupt() {
    assert_eq!(decode_action("updated").unwrap(), AuditAction::Updated);
    assert!(matches!(
      decode_action("archived"),
      Err(Error::Corrupt { column: "action", .. })
    ));
  }
}
