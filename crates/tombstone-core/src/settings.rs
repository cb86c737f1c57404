//! Store-level settings supplied at configuration time.

use std::collections::HashMap;

use serde::Deserialize;

/// What the store does when an audit append fails after a successful
/// persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditFailurePolicy {
  /// Log a warning, notify the hook, and return the mutation result.
  #[default]
  Warn,
  /// Return [`crate::Error::AuditWrite`]. The mutation stays persisted.
  Escalate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSettings {
  /// Extra snapshot exclusions keyed by record type, added to each schema's
  /// own `AUDIT_EXCLUDE` list.
  #[serde(default)]
  pub audit_exclude: HashMap<String, Vec<String>>,

  #[serde(default)]
  pub audit_failure: AuditFailurePolicy,
}

impl StoreSettings {
  /// Full exclusion list for one record type.
  pub fn exclusions_for(
    &self,
    record_type: &str,
    schema_exclude: &[&str],
  ) -> Vec<String> {
    let mut out: Vec<String> =
      schema_exclude.iter().map(|s| (*s).to_owned()).collect();
    if let Some(extra) = self.audit_exclude.get(record_type) {
      for field in extra {
        if !out.contains(field) {
          out.push(field.clone());
        }
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exclusions_merge_without_duplicates() {
    let mut settings = StoreSettings::default();
    settings.audit_exclude.insert(
      "person".into(),
      vec!["password".into(), "token".into()],
    );

    let merged = settings.exclusions_for("person", &["password"]);
    assert_eq!(merged, vec!["password".to_owned(), "token".to_owned()]);

    let other = settings.exclusions_for("invoice", &[]);
    assert!(other.is_empty());
  }

  #[test]
  fn warn_is_the_default_policy() {
    assert_eq!(AuditFailurePolicy::default(), AuditFailurePolicy::Warn);
  }
}
