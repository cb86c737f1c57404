//! [`RecordStore`]: record lifecycle on top of a backend and an audit sink.
//!
//! A record moves through create, any number of updates, soft delete (which
//! is itself a persisted update), and optionally a hard delete that removes
//! the row for good. Every persisted mutation except the hard delete emits
//! one audit entry.
//!
//! Operations that must see tombstoned rows (update, soft delete, hard
//! delete) resolve ids through the `All` view, so a soft-deleted record stays
//! addressable.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  Error, Result,
  audit::{
    AuditAction, AuditEntry, AuditSink, AuditWriteWarning, FieldChange,
    MutationContext, Transition,
  },
  query::Query,
  record::{NewRow, Record, RecordId, RecordSchema, StoredRecord, encode_fields},
  settings::{AuditFailurePolicy, StoreSettings},
  store::RecordBackend,
  view::View,
};

type AuditFailureHook = Arc<dyn Fn(&AuditWriteWarning) + Send + Sync>;

/// Whether an update emits its audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditMode {
  #[default]
  Emit,
  /// Persist without logging. Only offered on updates.
  Suppress,
}

/// The record store.
///
/// Cloning is as cheap as cloning the backend and sink.
#[derive(Clone)]
pub struct RecordStore<B, A> {
  backend:          B,
  sink:             A,
  settings:         StoreSettings,
  on_audit_failure: Option<AuditFailureHook>,
}

impl<B: RecordBackend, A: AuditSink> RecordStore<B, A> {
  pub fn new(backend: B, sink: A) -> Self {
    Self {
      backend,
      sink,
      settings: StoreSettings::default(),
      on_audit_failure: None,
    }
  }

  pub fn with_settings(mut self, settings: StoreSettings) -> Self {
    self.settings = settings;
    self
  }

  /// Register a callback for audit appends that failed under
  /// [`AuditFailurePolicy::Warn`].
  pub fn on_audit_failure(
    mut self,
    hook: impl Fn(&AuditWriteWarning) + Send + Sync + 'static,
  ) -> Self {
    self.on_audit_failure = Some(Arc::new(hook));
    self
  }

  pub fn backend(&self) -> &B { &self.backend }

  pub fn sink(&self) -> &A { &self.sink }

  pub fn settings(&self) -> &StoreSettings { &self.settings }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Validate and persist a new record. The `created` audit entry is always
  /// emitted.
  pub async fn create<T: RecordSchema>(
    &self,
    fields: T,
    ctx: &MutationContext,
  ) -> Result<Record<T>> {
    let encoded = encode_fields(&fields)?;

    let row = self
      .backend
      .insert(NewRow {
        record_type: T::RECORD_TYPE,
        created_at:  Utc::now(),
        fields:      encoded,
      })
      .await
      .map_err(Error::backend)?;

    tracing::debug!(record_type = T::RECORD_TYPE, id = %row.id, "record created");

    let action = AuditAction::resolve(Transition::Inserted, row.deleted);
    self.emit::<T>(action, &row, BTreeMap::new(), ctx).await?;

    Ok(assemble(&row, fields))
  }

  /// Replace a record's payload. Equivalent to
  /// `update_with(id, fields, ctx, AuditMode::Emit)`.
  pub async fn update<T: RecordSchema>(
    &self,
    id: RecordId,
    fields: T,
    ctx: &MutationContext,
  ) -> Result<Record<T>> {
    self.update_with(id, fields, ctx, AuditMode::Emit).await
  }

  /// Replace a record's payload and bump `updated_at`.
  ///
  /// The audit action follows the record's state afterwards: updating a
  /// tombstoned record logs `deleted`, not `updated`.
  pub async fn update_with<T: RecordSchema>(
    &self,
    id: RecordId,
    fields: T,
    ctx: &MutationContext,
    mode: AuditMode,
  ) -> Result<Record<T>> {
    let encoded = encode_fields(&fields)?;
    let previous = self.load::<T>(id).await?;

    let mut row = previous.clone();
    row.fields = encoded;
    row.updated_at = stamp(previous.created_at);

    let row = self.rewrite::<T>(&previous, row, ctx, mode).await?;
    Ok(assemble(&row, fields))
  }

  /// Load a record through the `All` view, edit its payload in place, and
  /// persist it like [`update`](Self::update).
  pub async fn modify<T, F>(
    &self,
    id: RecordId,
    edit: F,
    ctx: &MutationContext,
  ) -> Result<Record<T>>
  where
    T: RecordSchema,
    F: FnOnce(&mut T) + Send,
  {
    let previous = self.load::<T>(id).await?;
    let mut fields: T =
      serde_json::from_value(Value::Object(previous.fields.clone()))?;
    edit(&mut fields);
    let encoded = encode_fields(&fields)?;

    let mut row = previous.clone();
    row.fields = encoded;
    row.updated_at = stamp(previous.created_at);

    let row = self.rewrite::<T>(&previous, row, ctx, AuditMode::Emit).await?;
    Ok(assemble(&row, fields))
  }

  /// Tombstone a record and emit one `deleted` entry.
  ///
  /// Works on records that are already deleted: `deleted_at` is stamped
  /// again and another entry is emitted.
  pub async fn soft_delete<T: RecordSchema>(
    &self,
    id: RecordId,
    ctx: &MutationContext,
  ) -> Result<()> {
    let previous = self.load::<T>(id).await?;
    let at = stamp(previous.created_at);

    let mut row = previous.clone();
    row.deleted = true;
    row.deleted_at = Some(at);
    row.updated_at = at;

    self.rewrite::<T>(&previous, row, ctx, AuditMode::Emit).await?;
    tracing::debug!(record_type = T::RECORD_TYPE, %id, "record soft-deleted");
    Ok(())
  }

  /// Remove a record permanently. Not audited.
  pub async fn hard_delete<T: RecordSchema>(&self, id: RecordId) -> Result<()> {
    let removed = self
      .backend
      .remove(T::RECORD_TYPE, id)
      .await
      .map_err(Error::backend)?;

    if !removed {
      return Err(not_found::<T>(id));
    }

    tracing::debug!(record_type = T::RECORD_TYPE, %id, "record hard-deleted");
    Ok(())
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  /// Fetch one record through `view`.
  pub async fn get<T: RecordSchema>(
    &self,
    view: View,
    id: RecordId,
  ) -> Result<Record<T>> {
    let row = self.load::<T>(id).await?;
    if !view.admits(row.deleted) {
      return Err(not_found::<T>(id));
    }
    Record::from_stored(row)
  }

  /// First match under `view` in default order, or `None`.
  pub async fn get_or_none<T, P>(
    &self,
    view: View,
    predicate: P,
  ) -> Result<Option<Record<T>>>
  where
    T: RecordSchema,
    P: Fn(&Record<T>) -> bool + Send + Sync,
  {
    let matches = self.query::<T>(view).fetch().await?;
    Ok(matches.into_iter().find(|record| predicate(record)))
  }

  pub fn query<T: RecordSchema>(&self, view: View) -> Query<'_, T, B, A> {
    Query::new(self, view)
  }

  /// Records that are not soft-deleted.
  pub fn active<T: RecordSchema>(&self) -> Query<'_, T, B, A> {
    self.query(View::Active)
  }

  /// Soft-deleted records only.
  pub fn deleted<T: RecordSchema>(&self) -> Query<'_, T, B, A> {
    self.query(View::Deleted)
  }

  /// Every record.
  pub fn all<T: RecordSchema>(&self) -> Query<'_, T, B, A> {
    self.query(View::All)
  }

  // ── Internals ───────────────────────────────────────────────────────────

  async fn load<T: RecordSchema>(&self, id: RecordId) -> Result<StoredRecord> {
    self
      .backend
      .get(T::RECORD_TYPE, id)
      .await
      .map_err(Error::backend)?
      .ok_or_else(|| not_found::<T>(id))
  }

  async fn rewrite<T: RecordSchema>(
    &self,
    previous: &StoredRecord,
    row: StoredRecord,
    ctx: &MutationContext,
    mode: AuditMode,
  ) -> Result<StoredRecord> {
    let written = self
      .backend
      .replace(row.clone())
      .await
      .map_err(Error::backend)?;

    // Hard-deleted between the load and the write.
    if !written {
      return Err(not_found::<T>(row.id));
    }

    if mode == AuditMode::Emit {
      let changes = self.tracked_changes::<T>(&previous.fields, &row.fields);
      let action = AuditAction::resolve(Transition::Rewritten, row.deleted);
      self.emit::<T>(action, &row, changes, ctx).await?;
    }

    Ok(row)
  }

  fn tracked_changes<T: RecordSchema>(
    &self,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
  ) -> BTreeMap<String, FieldChange> {
    let exclude = self.settings.exclusions_for(T::RECORD_TYPE, T::AUDIT_EXCLUDE);

    T::TRACKED_FIELDS
      .iter()
      .filter(|field| !exclude.iter().any(|e| e == *field))
      .filter_map(|field| {
        let from = before.get(*field).cloned().unwrap_or(Value::Null);
        let to = after.get(*field).cloned().unwrap_or(Value::Null);
        (from != to).then(|| ((*field).to_owned(), FieldChange { from, to }))
      })
      .collect()
  }

  async fn emit<T: RecordSchema>(
    &self,
    action: AuditAction,
    row: &StoredRecord,
    changes: BTreeMap<String, FieldChange>,
    ctx: &MutationContext,
  ) -> Result<()> {
    let exclude = self.settings.exclusions_for(T::RECORD_TYPE, T::AUDIT_EXCLUDE);

    let entry = AuditEntry {
      entry_id: Uuid::new_v4(),
      action,
      origin: ctx.origin.clone(),
      actor: ctx.actor.clone(),
      record_type: T::RECORD_TYPE.to_owned(),
      record_id: row.id,
      snapshot: row.snapshot(&exclude),
      changes,
      recorded_at: Utc::now(),
    };

    let Err(error) = self.sink.append(&entry).await else {
      return Ok(());
    };

    match self.settings.audit_failure {
      AuditFailurePolicy::Escalate => Err(Error::AuditWrite(error)),
      AuditFailurePolicy::Warn => {
        tracing::warn!(
          record_type = T::RECORD_TYPE,
          id = %row.id,
          %action,
          %error,
          "audit write failed; mutation kept",
        );
        if let Some(hook) = &self.on_audit_failure {
          hook(&AuditWriteWarning { entry, error });
        }
        Ok(())
      }
    }
  }
}

/// `now`, clamped so `updated_at` never precedes `created_at`.
fn stamp(created_at: DateTime<Utc>) -> DateTime<Utc> {
  Utc::now().max(created_at)
}

fn assemble<T>(row: &StoredRecord, fields: T) -> Record<T> {
  Record {
    id: row.id,
    created_at: row.created_at,
    updated_at: row.updated_at,
    deleted: row.deleted,
    deleted_at: row.deleted_at,
    fields,
  }
}

fn not_found<T: RecordSchema>(id: RecordId) -> Error {
  Error::NotFound { record_type: T::RECORD_TYPE, id }
}
