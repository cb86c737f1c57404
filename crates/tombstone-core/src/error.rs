//! Error types for `tombstone-core`.

use thiserror::Error;

use crate::{audit::AuditError, record::RecordId};

/// A payload was rejected at the construction/validation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field `{field}`: {message}")]
pub struct ValidationError {
  pub field:   String,
  pub message: String,
}

impl ValidationError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self { field: field.into(), message: message.into() }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("{record_type} record not found: {id}")]
  NotFound {
    record_type: &'static str,
    id:          RecordId,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// Only surfaced under [`AuditFailurePolicy::Escalate`]; the mutation
  /// itself has already been persisted.
  ///
  /// [`AuditFailurePolicy::Escalate`]: crate::settings::AuditFailurePolicy::Escalate
  #[error("audit write failed after persist: {0}")]
  AuditWrite(#[source] AuditError),
}

impl Error {
  pub(crate) fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Backend(Box::new(err))
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
