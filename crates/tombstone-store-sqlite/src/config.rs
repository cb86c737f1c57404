//! Store configuration and the one-call constructor built on it.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use serde::Deserialize;
use tombstone_core::{
  AuditFailurePolicy, RecordStore, StoreSettings, TracingSink,
};

use crate::{Result, SqliteAuditSink, SqliteBackend};

/// Environment variables with this prefix override file settings, e.g.
/// `TOMBSTONE_STORE_PATH`.
pub const ENV_PREFIX: &str = "TOMBSTONE";

/// Runtime store configuration, deserialised from `tombstone.toml` and the
/// environment.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// SQLite file; `:memory:` opens a private in-memory database.
  #[serde(default = "default_store_path")]
  pub store_path:    PathBuf,

  /// Also write audit entries to the `audit_entries` table. Entries always
  /// go to the `activity` tracing target.
  #[serde(default = "default_persist_audit")]
  pub persist_audit: bool,

  #[serde(default)]
  pub audit_failure: AuditFailurePolicy,

  /// Extra snapshot exclusions per record type.
  #[serde(default)]
  pub audit_exclude: HashMap<String, Vec<String>>,
}

fn default_store_path() -> PathBuf { PathBuf::from("tombstone.db") }

fn default_persist_audit() -> bool { true }

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      store_path:    default_store_path(),
      persist_audit: default_persist_audit(),
      audit_failure: AuditFailurePolicy::default(),
      audit_exclude: HashMap::new(),
    }
  }
}

impl StoreConfig {
  /// Read `path` (a missing file yields the defaults), then
  /// apply `TOMBSTONE_*` environment overrides.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.as_ref()).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX))
      .build()?;

    Ok(settings.try_deserialize()?)
  }

  pub fn settings(&self) -> StoreSettings {
    StoreSettings {
      audit_exclude: self.audit_exclude.clone(),
      audit_failure: self.audit_failure,
    }
  }
}

/// The sink stack used by [`open`]: tracing always, SQLite when
/// `persist_audit` is set.
pub type StoreSink = (TracingSink, Option<SqliteAuditSink>);

pub type SqliteRecordStore = RecordStore<SqliteBackend, StoreSink>;

/// Open the backend described by `config` and wrap it in a [`RecordStore`].
pub async fn open(config: &StoreConfig) -> Result<SqliteRecordStore> {
  let backend = if config.store_path == Path::new(":memory:") {
    SqliteBackend::open_in_memory().await?
  } else {
    SqliteBackend::open(&config.store_path).await?
  };

  let persisted = config.persist_audit.then(|| backend.audit_sink());

  tracing::debug!(
    store_path = %config.store_path.display(),
    persist_audit = config.persist_audit,
    "record store opened",
  );

  Ok(RecordStore::new(backend, (TracingSink, persisted)).with_settings(config.settings()))
}
