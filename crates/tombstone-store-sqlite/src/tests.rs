//! Integration tests for `SqliteBackend` and `SqliteAuditSink` against an
//! in-memory database.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tombstone_core::{
  AuditAction, AuditFailurePolicy, MutationContext, Origin, Record, RecordBackend,
  RecordId, RecordSchema, RecordStore, View,
};
use uuid::Uuid;

use crate::{SqliteAuditSink, SqliteBackend, StoreConfig, open};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Contact {
  name:  String,
  email: Option<String>,
  token: Option<String>,
}

impl RecordSchema for Contact {
  const RECORD_TYPE: &'static str = "contact";
  const AUDIT_EXCLUDE: &'static [&'static str] = &["token"];
  const TRACKED_FIELDS: &'static [&'static str] = &["email"];
}

fn contact(name: &str) -> Contact {
  Contact { name: name.into(), email: None, token: Some("secret".into()) }
}

async fn store() -> RecordStore<SqliteBackend, SqliteAuditSink> {
  let backend = SqliteBackend::open_in_memory()
    .await
    .expect("in-memory store");
  let sink = backend.audit_sink();
  RecordStore::new(backend, sink)
}

fn temp_path(ext: &str) -> PathBuf {
  std::env::temp_dir().join(format!("tombstone-test-{}.{ext}", Uuid::new_v4()))
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_roundtrip() {
  let s = store().await;

  let created = s
    .create(contact("Alice"), &MutationContext::new())
    .await
    .unwrap();
  assert_eq!(created.id, RecordId(1));
  assert_eq!(created.created_at, created.updated_at);

  let fetched: Record<Contact> = s.get(View::Active, created.id).await.unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn soft_delete_partitions_views() {
  let s = store().await;
  let keep = s.create(contact("Keep"), &MutationContext::new()).await.unwrap();
  let gone = s.create(contact("Gone"), &MutationContext::new()).await.unwrap();

  s.soft_delete::<Contact>(gone.id, &MutationContext::admin())
    .await
    .unwrap();

  let active = s.active::<Contact>().fetch().await.unwrap();
  assert_eq!(active.iter().map(|r| r.id).collect::<Vec<_>>(), [keep.id]);

  let deleted = s.deleted::<Contact>().fetch().await.unwrap();
  assert_eq!(deleted.len(), 1);
  assert_eq!(deleted[0].id, gone.id);
  assert!(deleted[0].deleted_at.is_some());

  // Newest first by default.
  let all = s.all::<Contact>().fetch().await.unwrap();
  assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), [gone.id, keep.id]);
}

#[tokio::test]
async fn update_is_visible_after_reload() {
  let s = store().await;
  let created = s.create(contact("Alice"), &MutationContext::new()).await.unwrap();

  let mut fields = created.fields.clone();
  fields.email = Some("alice@example.com".into());
  s.update(created.id, fields, &MutationContext::api())
    .await
    .unwrap();

  let fetched: Record<Contact> = s.get(View::All, created.id).await.unwrap();
  assert_eq!(fetched.fields.email.as_deref(), Some("alice@example.com"));
  assert!(fetched.updated_at >= fetched.created_at);
}

#[tokio::test]
async fn hard_delete_removes_row_but_keeps_its_audit_trail() {
  let s = store().await;
  let created = s.create(contact("Alice"), &MutationContext::new()).await.unwrap();
  s.soft_delete::<Contact>(created.id, &MutationContext::new())
    .await
    .unwrap();

  s.hard_delete::<Contact>(created.id).await.unwrap();

  for view in [View::Active, View::Deleted, View::All] {
    assert_eq!(s.query::<Contact>(view).count().await.unwrap(), 0);
  }

  let trail = s.sink().entries_for("contact", created.id).await.unwrap();
  let actions: Vec<_> = trail.iter().map(|e| e.action).collect();
  assert_eq!(actions, [AuditAction::Created, AuditAction::Deleted]);
}

#[tokio::test]
async fn missing_rows_are_reported() {
  let s = store().await;
  let missing = RecordId(99);

  assert!(
    s.soft_delete::<Contact>(missing, &MutationContext::new())
      .await
      .unwrap_err()
      .is_not_found()
  );
  assert!(s.hard_delete::<Contact>(missing).await.unwrap_err().is_not_found());

  let backend = s.backend();
  assert!(backend.get("contact", missing).await.unwrap().is_none());
  assert!(!backend.remove("contact", missing).await.unwrap());
}

#[tokio::test]
async fn bulk_delete_logs_each_record() {
  let s = store().await;
  for name in ["a", "b", "c"] {
    s.create(contact(name), &MutationContext::new()).await.unwrap();
  }

  let deleted = s
    .active::<Contact>()
    .delete(&MutationContext::api())
    .await
    .unwrap();
  assert_eq!(deleted, 3);
  assert_eq!(s.active::<Contact>().count().await.unwrap(), 0);

  let entries = s.sink().entries().await.unwrap();
  let deletions = entries
    .iter()
    .filter(|e| e.action == AuditAction::Deleted)
    .count();
  assert_eq!(deletions, 3);
}

// ─── Audit table ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_entries_roundtrip_through_the_table() {
  let s = store().await;
  let created = s
    .create(contact("Alice"), &MutationContext::admin().with_actor("staff-3"))
    .await
    .unwrap();

  let mut fields = created.fields.clone();
  fields.email = Some("alice@example.com".into());
  s.update(created.id, fields, &MutationContext::api())
    .await
    .unwrap();

  let entries = s.sink().entries().await.unwrap();
  assert_eq!(entries.len(), 2);

  let first = &entries[0];
  assert_eq!(first.action, AuditAction::Created);
  assert_eq!(first.origin, Some(Origin::admin()));
  assert_eq!(first.actor.as_deref(), Some("staff-3"));
  assert_eq!(first.record_type, "contact");
  assert_eq!(first.snapshot["name"], json!("Alice"));
  assert!(!first.snapshot.contains_key("token"));

  let second = &entries[1];
  assert_eq!(second.action, AuditAction::Updated);
  assert_eq!(second.changes["email"].from, json!(null));
  assert_eq!(second.changes["email"].to, json!("alice@example.com"));
}

// ─── Files and configuration ─────────────────────────────────────────────────

#[tokio::test]
async fn file_store_persists_across_handles() {
  let path = temp_path("db");

  let id = {
    let backend = SqliteBackend::open(&path).await.unwrap();
    let s = RecordStore::new(backend.clone(), backend.audit_sink());
    let created = s.create(contact("Alice"), &MutationContext::new()).await.unwrap();
    s.soft_delete::<Contact>(created.id, &MutationContext::new())
      .await
      .unwrap();
    created.id
  };

  let backend = SqliteBackend::open(&path).await.unwrap();
  let s = RecordStore::new(backend.clone(), backend.audit_sink());

  let reloaded: Record<Contact> = s.get(View::Deleted, id).await.unwrap();
  assert!(reloaded.deleted);
  assert_eq!(s.sink().entries_for("contact", id).await.unwrap().len(), 2);

  let _ = std::fs::remove_file(&path);
}

#[test]
fn config_defaults_when_file_is_missing() {
  let config = StoreConfig::load(temp_path("toml")).unwrap();
  assert_eq!(config.store_path, PathBuf::from("tombstone.db"));
  assert!(config.persist_audit);
  assert_eq!(config.audit_failure, AuditFailurePolicy::Warn);
}

#[test]
fn config_reads_toml_file() {
  let path = temp_path("toml");
  std::fs::write(
    &path,
    r#"
store_path    = ":memory:"
persist_audit = false
audit_failure = "escalate"

[audit_exclude]
contact = ["email"]
"#,
  )
  .unwrap();

  let config = StoreConfig::load(&path).unwrap();
  let _ = std::fs::remove_file(&path);

  assert_eq!(config.store_path, PathBuf::from(":memory:"));
  assert!(!config.persist_audit);
  assert_eq!(config.audit_failure, AuditFailurePolicy::Escalate);
  assert_eq!(
    config.settings().exclusions_for("contact", Contact::AUDIT_EXCLUDE),
    ["token".to_owned(), "email".to_owned()]
  );
}

#[tokio::test]
async fn open_wires_backend_settings_and_sinks() {
  let mut config = StoreConfig {
    store_path: PathBuf::from(":memory:"),
    ..StoreConfig::default()
  };
  config
    .audit_exclude
    .insert("contact".into(), vec!["email".into()]);

  let s = open(&config).await.unwrap();
  let created = s.create(contact("Alice"), &MutationContext::new()).await.unwrap();

  let persisted = s.sink().1.as_ref().expect("audit table enabled");
  let entries = persisted.entries_for("contact", created.id).await.unwrap();
  assert_eq!(entries.len(), 1);
  assert!(!entries[0].snapshot.contains_key("email"));
  assert!(!entries[0].snapshot.contains_key("token"));
}
