//! Lazy, restartable queries over one view.

use std::cmp::Ordering;

use crate::{
  Error, Result,
  audit::{AuditSink, MutationContext},
  lifecycle::RecordStore,
  record::{Record, RecordSchema},
  store::RecordBackend,
  view::{OrderBy, View},
};

type Predicate<'s, T> = Box<dyn Fn(&Record<T>) -> bool + Send + Sync + 's>;

/// A description of a record selection. Nothing touches the backend until a
/// terminal method runs, and every terminal call re-reads from scratch.
pub struct Query<'s, T, B, A> {
  store:      &'s RecordStore<B, A>,
  view:       View,
  predicates: Vec<Predicate<'s, T>>,
  order:      OrderBy,
  offset:     usize,
  limit:      Option<usize>,
}

impl<'s, T, B, A> Query<'s, T, B, A>
where
  T: RecordSchema,
  B: RecordBackend,
  A: AuditSink,
{
  pub(crate) fn new(store: &'s RecordStore<B, A>, view: View) -> Self {
    Self {
      store,
      view,
      predicates: Vec::new(),
      order: OrderBy::default(),
      offset: 0,
      limit: None,
    }
  }

  pub fn view(&self) -> View { self.view }

  /// Narrow the selection. Predicates combine with AND.
  pub fn filter(
    mut self,
    predicate: impl Fn(&Record<T>) -> bool + Send + Sync + 's,
  ) -> Self {
    self.predicates.push(Box::new(predicate));
    self
  }

  pub fn order_by(mut self, order: OrderBy) -> Self {
    self.order = order;
    self
  }

  pub fn offset(mut self, offset: usize) -> Self {
    self.offset = offset;
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  // ── Terminal reads ──────────────────────────────────────────────────────

  pub async fn fetch(&self) -> Result<Vec<Record<T>>> {
    let rows = self
      .store
      .backend()
      .scan(T::RECORD_TYPE, self.view)
      .await
      .map_err(Error::backend)?;

    let mut records = rows
      .into_iter()
      .map(Record::from_stored)
      .collect::<Result<Vec<Record<T>>>>()?;

    records.retain(|r| self.predicates.iter().all(|p| p(r)));
    records.sort_by(|a, b| compare(self.order, a, b));

    Ok(
      records
        .into_iter()
        .skip(self.offset)
        .take(self.limit.unwrap_or(usize::MAX))
        .collect(),
    )
  }

  pub async fn first(&self) -> Result<Option<Record<T>>> {
    Ok(self.fetch().await?.into_iter().next())
  }

  pub async fn count(&self) -> Result<usize> { Ok(self.fetch().await?.len()) }

  pub async fn exists(&self) -> Result<bool> { Ok(self.first().await?.is_some()) }

  // ── Terminal writes ─────────────────────────────────────────────────────

  /// Soft-delete every match, one record at a time, each with its own audit
  /// entry. Already-tombstoned matches go through the same path.
  ///
  /// Stops at the first failure; records handled before it stay deleted.
  pub async fn delete(&self, ctx: &MutationContext) -> Result<usize> {
    let matched = self.fetch().await?;
    let mut deleted = 0;
    for record in matched {
      self.store.soft_delete::<T>(record.id, ctx).await?;
      deleted += 1;
    }
    Ok(deleted)
  }

  /// Permanently remove every match. Not audited.
  pub async fn hard_delete(&self) -> Result<usize> {
    let matched = self.fetch().await?;
    let mut removed = 0;
    for record in matched {
      self.store.hard_delete::<T>(record.id).await?;
      removed += 1;
    }
    Ok(removed)
  }
}

fn compare<T>(order: OrderBy, a: &Record<T>, b: &Record<T>) -> Ordering {
  match order {
    OrderBy::IdDesc => b.id.cmp(&a.id),
    OrderBy::IdAsc => a.id.cmp(&b.id),
    OrderBy::CreatedAtAsc => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
    OrderBy::CreatedAtDesc => b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
    OrderBy::UpdatedAtAsc => a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)),
    OrderBy::UpdatedAtDesc => b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)),
  }
}
