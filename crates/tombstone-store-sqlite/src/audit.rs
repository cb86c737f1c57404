//! [`SqliteAuditSink`]: persists audit entries in the `audit_entries`
//! table. Rows are only ever inserted.

use tombstone_core::{AuditEntry, AuditError, AuditSink, RecordId};

use crate::{
  Error, Result,
  encode::{RawAuditEntry, encode_changes, encode_dt, encode_object, encode_uuid},
};

/// Append-only audit log sharing the record store's connection.
#[derive(Clone)]
pub struct SqliteAuditSink {
  conn: tokio_rusqlite::Connection,
}

impl SqliteAuditSink {
  pub(crate) fn new(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  async fn insert(&self, entry: &AuditEntry) -> Result<()> {
    let entry_id_str = encode_uuid(entry.entry_id);
    let action       = entry.action.to_string();
    let origin       = entry.origin.as_ref().map(|o| o.as_str().to_owned());
    let actor        = entry.actor.clone();
    let record_type  = entry.record_type.clone();
    let record_id    = entry.record_id.0;
    let snapshot_str = encode_object(&entry.snapshot)?;
    let changes_str  = encode_changes(&entry.changes)?;
    let at_str       = encode_dt(entry.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_entries (
             entry_id, action, origin, actor, record_type,
             record_id, snapshot_json, changes_json, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            entry_id_str,
            action,
            origin,
            actor,
            record_type,
            record_id,
            snapshot_str,
            changes_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every stored entry, in append order.
  pub async fn entries(&self) -> Result<Vec<AuditEntry>> {
    let raws: Vec<RawAuditEntry> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM audit_entries ORDER BY rowid",
          RawAuditEntry::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawAuditEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEntry::into_entry).collect()
  }

  /// Entries for one record, in append order. Still available after the
  /// record has been hard-deleted.
  pub async fn entries_for(
    &self,
    record_type: &str,
    id: RecordId,
  ) -> Result<Vec<AuditEntry>> {
    let record_type = record_type.to_owned();

    let raws: Vec<RawAuditEntry> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM audit_entries
            WHERE record_type = ?1 AND record_id = ?2
            ORDER BY rowid",
          RawAuditEntry::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![record_type, id.0], RawAuditEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEntry::into_entry).collect()
  }
}

impl AuditSink for SqliteAuditSink {
  async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
    self.insert(entry).await.map_err(|err| match err {
      Error::Json(e) => AuditError::Encode(e),
      other => AuditError::sink(other),
    })
  }
}
