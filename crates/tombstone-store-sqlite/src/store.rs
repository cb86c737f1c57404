//! [`SqliteBackend`], the SQLite implementation of [`RecordBackend`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tombstone_core::{
  RecordBackend, RecordId, StoredRecord, View, record::NewRow,
};

use crate::{
  Result,
  audit::SqliteAuditSink,
  encode::{RawRecord, encode_dt, encode_object},
  schema::SCHEMA,
};

// ─── Backend ─────────────────────────────────────────────────────────────────

/// A record backend backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every
/// method issues its statements inside one `call`, so each runs atomically
/// on the connection thread.
#[derive(Clone)]
pub struct SqliteBackend {
  conn: tokio_rusqlite::Connection,
}

impl SqliteBackend {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let backend = Self { conn };
    backend.init_schema().await?;
    Ok(backend)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let backend = Self { conn };
    backend.init_schema().await?;
    Ok(backend)
  }

  /// An audit sink writing to this database's `audit_entries` table.
  pub fn audit_sink(&self) -> SqliteAuditSink {
    SqliteAuditSink::new(self.conn.clone())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RecordBackend impl ──────────────────────────────────────────────────────

impl RecordBackend for SqliteBackend {
  type Error = crate::Error;

  async fn insert(&self, row: NewRow) -> Result<StoredRecord> {
    let record_type = row.record_type.to_owned();
    let at_str      = encode_dt(row.created_at);
    let fields_str  = encode_object(&row.fields)?;

    let id = {
      let record_type = record_type.clone();
      self
        .conn
        .call(move |conn| {
          conn.execute(
            "INSERT INTO records (record_type, created_at, updated_at, deleted, fields_json)
             VALUES (?1, ?2, ?2, 0, ?3)",
            rusqlite::params![record_type, at_str, fields_str],
          )?;
          Ok(conn.last_insert_rowid())
        })
        .await?
    };

    Ok(StoredRecord {
      id: RecordId(id),
      record_type,
      created_at: row.created_at,
      updated_at: row.created_at,
      deleted: false,
      deleted_at: None,
      fields: row.fields,
    })
  }

  async fn get(
    &self,
    record_type: &'static str,
    id: RecordId,
  ) -> Result<Option<StoredRecord>> {
    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM records WHERE id = ?1 AND record_type = ?2",
          RawRecord::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id.0, record_type], RawRecord::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_stored).transpose()
  }

  async fn replace(&self, row: StoredRecord) -> Result<bool> {
    let updated_str    = encode_dt(row.updated_at);
    let deleted_at_str = row.deleted_at.map(encode_dt);
    let fields_str     = encode_object(&row.fields)?;
    let id             = row.id.0;
    let record_type    = row.record_type;
    let deleted        = row.deleted;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE records
              SET updated_at = ?1, deleted = ?2, deleted_at = ?3, fields_json = ?4
            WHERE id = ?5 AND record_type = ?6",
          rusqlite::params![
            updated_str,
            deleted,
            deleted_at_str,
            fields_str,
            id,
            record_type,
          ],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn remove(&self, record_type: &'static str, id: RecordId) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM records WHERE id = ?1 AND record_type = ?2",
          rusqlite::params![id.0, record_type],
        )?)
      })
      .await?;

    Ok(removed == 1)
  }

  async fn scan(
    &self,
    record_type: &'static str,
    view: View,
  ) -> Result<Vec<StoredRecord>> {
    let tombstone = match view {
      View::Active => "AND deleted = 0",
      View::Deleted => "AND deleted = 1",
      View::All => "",
    };

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM records WHERE record_type = ?1 {tombstone} ORDER BY id DESC",
          RawRecord::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![record_type], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_stored).collect()
  }
}
