//! CLI command implementations for marketcore.
//!
//! Every command loads configuration and opens the store through
//! [`Context`], then calls into the core services.

use std::path::{Path, PathBuf};

use crate::{Result, config::Config, store::Store};

pub mod item;
pub mod ledger;
pub mod pool;
pub mod serve;

/// Loaded configuration plus an open store handle.
pub struct Context {
   pub config: Config,
   pub store:  Store,
}

impl Context {
   /// Loads config (with an optional extra file) and opens the database,
   /// preferring `db` over the configured path.
   pub fn open(config_path: Option<&Path>, db: Option<PathBuf>) -> Result<Self> {
      let mut config = Config::load(config_path)?;
      if let Some(db) = db {
         config.database_path = Some(db);
      }
      let path = config.database_path();
      tracing::debug!(path = %path.display(), "opening store");
      let store = Store::open(&path, config.busy_timeout())?;
      Ok(Self { config, store })
   }
}
