//! In-process [`RecordBackend`], mostly for tests and embedding.

use std::{
  collections::BTreeMap,
  convert::Infallible,
  sync::{Arc, Mutex, PoisonError},
};

use crate::{
  record::{NewRow, RecordId, StoredRecord},
  store::RecordBackend,
  view::View,
};

#[derive(Debug, Default)]
struct Tables {
  last_id: i64,
  rows:    BTreeMap<RecordId, StoredRecord>,
}

/// A backend holding every row in a mutex-guarded map.
///
/// Cloning is cheap; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
  tables: Arc<Mutex<Tables>>,
}

impl MemoryBackend {
  pub fn new() -> Self { Self::default() }

  fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
    let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut tables)
  }
}

impl RecordBackend for MemoryBackend {
  type Error = Infallible;

  async fn insert(&self, row: NewRow) -> Result<StoredRecord, Infallible> {
    Ok(self.with_tables(|t| {
      t.last_id += 1;
      let stored = StoredRecord {
        id:          RecordId(t.last_id),
        record_type: row.record_type.to_owned(),
        created_at:  row.created_at,
        updated_at:  row.created_at,
        deleted:     false,
        deleted_at:  None,
        fields:      row.fields,
      };
      t.rows.insert(stored.id, stored.clone());
      stored
    }))
  }

  async fn get(
    &self,
    record_type: &'static str,
    id: RecordId,
  ) -> Result<Option<StoredRecord>, Infallible> {
    Ok(self.with_tables(|t| {
      t.rows
        .get(&id)
        .filter(|row| row.record_type == record_type)
        .cloned()
    }))
  }

  async fn replace(&self, row: StoredRecord) -> Result<bool, Infallible> {
    Ok(self.with_tables(|t| match t.rows.get_mut(&row.id) {
      Some(existing) if existing.record_type == row.record_type => {
        existing.updated_at = row.updated_at;
        existing.deleted = row.deleted;
        existing.deleted_at = row.deleted_at;
        existing.fields = row.fields;
        true
      }
      _ => false,
    }))
  }

  async fn remove(
    &self,
    record_type: &'static str,
    id: RecordId,
  ) -> Result<bool, Infallible> {
    Ok(self.with_tables(|t| {
      let matches = t
        .rows
        .get(&id)
        .is_some_and(|row| row.record_type == record_type);
      matches && t.rows.remove(&id).is_some()
    }))
  }

  async fn scan(
    &self,
    record_type: &'static str,
    view: View,
  ) -> Result<Vec<StoredRecord>, Infallible> {
    Ok(self.with_tables(|t| {
      t.rows
        .values()
        .rev()
        .filter(|row| row.record_type == record_type && view.admits(row.deleted))
        .cloned()
        .collect()
    }))
  }
}
