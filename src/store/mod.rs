//! SQLite persistence shared by the lease pool and the settlement ledger.
//!
//! Every mutating operation runs inside an `IMMEDIATE` transaction, which takes
//! the database write lock before the first read. The lock lives in the
//! database file, so exclusivity holds across server processes as well as
//! across threads.

pub mod items;
mod schema;

use std::{
   path::{Path, PathBuf},
   sync::Arc,
   time::Duration,
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};

use crate::Result;

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
   #[error("failed to open database {}: {source}", .path.display())]
   Open {
      path:   PathBuf,
      #[source]
      source: rusqlite::Error,
   },

   #[error("sqlite error: {0}")]
   Sqlite(#[from] rusqlite::Error),

   #[error("failed to commit transaction: {0}")]
   Commit(#[source] rusqlite::Error),

   #[error("corrupt row in {table}: {reason}")]
   Corrupt { table: &'static str, reason: String },
}

/// Handle to the marketplace database.
///
/// Cheap to clone. Each call opens its own connection so that handles behave
/// like independent clients of the same file.
#[derive(Debug, Clone)]
pub struct Store {
   path:         Arc<PathBuf>,
   busy_timeout: Duration,
}

impl Store {
   pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

   /// Opens (creating if needed) the database and applies the schema.
   pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
      let path = path.as_ref();
      if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
         std::fs::create_dir_all(parent)?;
      }
      let store = Self { path: Arc::new(path.to_path_buf()), busy_timeout };
      let conn = store.connect()?;
      conn.execute_batch(schema::SCHEMA_SQL)?;
      tracing::debug!(path = %path.display(), "store opened");
      Ok(store)
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   fn connect(&self) -> Result<Connection> {
      let conn = Connection::open_with_flags(
         self.path.as_path(),
         OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
      )
      .map_err(|source| StoreError::Open { path: self.path.to_path_buf(), source })?;
      conn.busy_timeout(self.busy_timeout)?;
      conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
      Ok(conn)
   }

   /// Runs `f` inside an `IMMEDIATE` transaction.
   ///
   /// Commits when `f` returns `Ok`; any error (or a panic unwinding through
   /// `f`) drops the transaction, which rolls it back.
   pub fn write_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
      let mut conn = self.connect()?;
      let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
      let out = f(&tx)?;
      tx.commit().map_err(StoreError::Commit)?;
      Ok(out)
   }

   /// Runs read-only queries on a fresh connection.
   pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
      let conn = self.connect()?;
      f(&conn)
   }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
   ts.timestamp_millis()
}

pub(crate) fn from_millis(table: &'static str, millis: i64) -> Result<DateTime<Utc>> {
   DateTime::from_timestamp_millis(millis).ok_or_else(|| {
      StoreError::Corrupt { table, reason: format!("timestamp out of range: {millis}") }.into()
   })
}

/// Drops sub-millisecond precision so values survive a store round trip.
pub(crate) fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
   DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
