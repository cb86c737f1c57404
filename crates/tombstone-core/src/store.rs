//! The `RecordBackend` trait: the persistence seam under the record store.
//!
//! Backends (e.g. `tombstone-store-sqlite`, or [`crate::memory`]) store
//! untyped rows partitioned by record type. Lifecycle rules, validation and
//! audit emission all live above this trait in
//! [`crate::lifecycle::RecordStore`].

use std::future::Future;

use crate::{
  record::{NewRow, RecordId, StoredRecord},
  view::View,
};

/// Abstraction over a record storage backend.
///
/// Each call must be atomic on its own. Nothing is promised across calls:
/// two concurrent rewrites of the same row are last-write-wins.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded runtimes.
pub trait RecordBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new row and return it with its assigned id. The stored
  /// `updated_at` equals `created_at`, and the row is not deleted.
  fn insert(
    &self,
    row: NewRow,
  ) -> impl Future<Output = Result<StoredRecord, Self::Error>> + Send + '_;

  /// Fetch one row regardless of its tombstone.
  fn get(
    &self,
    record_type: &'static str,
    id: RecordId,
  ) -> impl Future<Output = Result<Option<StoredRecord>, Self::Error>> + Send + '_;

  /// Overwrite the mutable columns of an existing row (`updated_at`,
  /// `deleted`, `deleted_at`, fields). Returns `false` if the row is gone.
  fn replace(
    &self,
    row: StoredRecord,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Permanently remove a row. Returns `false` if it did not exist.
  fn remove(
    &self,
    record_type: &'static str,
    id: RecordId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every row of `record_type` visible under `view`, newest id first.
  fn scan(
    &self,
    record_type: &'static str,
    view: View,
  ) -> impl Future<Output = Result<Vec<StoredRecord>, Self::Error>> + Send + '_;
}
