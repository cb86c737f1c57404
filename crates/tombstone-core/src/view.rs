//! The three visibility views over a record collection.

use serde::{Deserialize, Serialize};

/// A fixed filter lens over the same underlying collection.
///
/// External layers pick one of these; there is no fourth visibility rule.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum View {
  /// Records that have not been soft-deleted.
  #[default]
  Active,
  /// Tombstoned records only.
  Deleted,
  /// Every record, tombstoned or not.
  All,
}

impl View {
  /// Whether a record with the given tombstone flag is visible.
  pub fn admits(self, deleted: bool) -> bool {
    match self {
      Self::Active => !deleted,
      Self::Deleted => deleted,
      Self::All => true,
    }
  }
}

/// Result ordering for [`crate::query::Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
  /// Newest id first; the store-wide default.
  #[default]
  IdDesc,
  IdAsc,
  CreatedAtAsc,
  CreatedAtDesc,
  UpdatedAtAsc,
  UpdatedAtDesc,
}

#[cfg(test)]
mod tests {
  use super::View;

  #[test]
  fn views_partition_on_the_tombstone() {
    assert!(View::Active.admits(false));
    assert!(!View::Active.admits(true));
    assert!(View::Deleted.admits(true));
    assert!(!View::Deleted.admits(false));
    assert!(View::All.admits(true) && View::All.admits(false));
  }

  #[test]
  fn active_is_the_default_view() {
    assert_eq!(View::default(), View::Active);
  }
}
