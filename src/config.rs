//! Configuration loading and the per-call settings snapshot.

use std::{
   fs,
   path::{Path, PathBuf},
   sync::OnceLock,
   time::Duration,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
   error::{ConfigError, Result},
   types::{Amount, CommissionRate, Role},
};

pub const MAX_LEASE_TTL_SECS: u64 = 24 * 60 * 60;
pub const MAX_LEDGER_LIMIT_CAP: usize = 10_000;

/// A bearer token accepted by the static auth gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
   pub token: String,
   pub id:    String,
   pub role:  Role,
}

/// Application configuration loaded from config files and environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   pub database_path: Option<PathBuf>,
   pub bind:          String,

   pub lease_ttl_secs:      u64,
   pub commission_bps:      u32,
   pub platform_account_id: String,
   pub price_tolerance_gwei: i64,

   pub busy_timeout_ms:           u64,
   pub lease_sweep_interval_secs: u64,
   pub ledger_default_limit:      usize,
   pub ledger_max_limit:          usize,

   pub tokens: Vec<TokenGrant>,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         database_path: None,
         bind: "127.0.0.1:8080".to_string(),
         lease_ttl_secs: 5 * 60,
         commission_bps: 1500,
         platform_account_id: "platform".to_string(),
         price_tolerance_gwei: 0,
         busy_timeout_ms: 5000,
         lease_sweep_interval_secs: 0,
         ledger_default_limit: 50,
         ledger_max_limit: 500,
         tokens: Vec::new(),
      }
   }
}

impl Config {
   /// Loads defaults, then the global config file, then `extra`, then
   /// `MARKETCORE_*` environment variables.
   pub fn load(extra: Option<&Path>) -> Result<Self> {
      let global = ensure_global_config();
      let mut figment =
         Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(global));
      if let Some(path) = extra {
         if !path.exists() {
            return Err(
               ConfigError::Invalid(format!("config file not found: {}", path.display())).into(),
            );
         }
         figment = figment.merge(Toml::file(path));
      }
      figment
         .merge(Env::prefixed("MARKETCORE_").lowercase(true))
         .extract()
         .map_err(|e| ConfigError::Load(Box::new(e)).into())
   }

   fn create_default_config(path: &Path) {
      if let Some(parent) = path.parent() {
         let _ = fs::create_dir_all(parent);
      }
      if let Ok(toml) = toml::to_string_pretty(&Self::default()) {
         let _ = fs::write(path, toml);
      }
   }

   pub fn database_path(&self) -> PathBuf {
      self
         .database_path
         .clone()
         .unwrap_or_else(|| data_dir().join("market.db"))
   }

   pub const fn busy_timeout(&self) -> Duration {
      Duration::from_millis(self.busy_timeout_ms)
   }

   /// `None` disables the background sweep.
   pub const fn sweep_interval(&self) -> Option<Duration> {
      if self.lease_sweep_interval_secs == 0 {
         None
      } else {
         Some(Duration::from_secs(self.lease_sweep_interval_secs))
      }
   }

   /// Clamps a requested ledger page size.
   pub fn ledger_limit(&self, requested: Option<usize>) -> usize {
      let max = self.ledger_max_limit.clamp(1, MAX_LEDGER_LIMIT_CAP);
      requested
         .unwrap_or(self.ledger_default_limit)
         .clamp(1, max)
   }

   /// Validates the economic settings and freezes them into a snapshot.
   pub fn settings(&self) -> Result<MarketSettings> {
      if self.lease_ttl_secs == 0 || self.lease_ttl_secs > MAX_LEASE_TTL_SECS {
         return Err(
            ConfigError::Invalid(format!(
               "lease_ttl_secs {} must be within 1..={MAX_LEASE_TTL_SECS}",
               self.lease_ttl_secs
            ))
            .into(),
         );
      }
      let commission = CommissionRate::from_bps(self.commission_bps).ok_or_else(|| {
         ConfigError::Invalid(format!("commission_bps {} exceeds 10000", self.commission_bps))
      })?;
      let platform_account_id = self.platform_account_id.trim();
      if platform_account_id.is_empty() {
         return Err(ConfigError::Invalid("platform_account_id is empty".to_string()).into());
      }
      if self.price_tolerance_gwei < 0 {
         return Err(
            ConfigError::Invalid(format!(
               "price_tolerance_gwei {} is negative",
               self.price_tolerance_gwei
            ))
            .into(),
         );
      }
      Ok(MarketSettings {
         lease_ttl: Duration::from_secs(self.lease_ttl_secs),
         commission,
         platform_account_id: platform_account_id.to_string(),
         price_tolerance: Amount::from_gwei(self.price_tolerance_gwei),
      })
   }
}

/// Immutable economic settings handed to each core call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSettings {
   pub lease_ttl:           Duration,
   pub commission:          CommissionRate,
   pub platform_account_id: String,
   pub price_tolerance:     Amount,
}

impl Default for MarketSettings {
   fn default() -> Self {
      Self {
         lease_ttl:           Duration::from_secs(5 * 60),
         commission:          CommissionRate::from_bps(1500).unwrap_or(CommissionRate::ZERO),
         platform_account_id: "platform".to_string(),
         price_tolerance:     Amount::ZERO,
      }
   }
}

/// Returns the base directory for marketcore data and configuration
pub fn base_dir() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| resolve_base_dir(".marketcore"))
}

fn ensure_global_config() -> PathBuf {
   let config_path = config_file_path();
   if !config_path.exists() {
      Config::create_default_config(config_path);
   }
   config_path.clone()
}

fn resolve_base_dir(dir_name: &str) -> PathBuf {
   BaseDirs::new()
      .map(|d| d.home_dir().join(dir_name))
      .or_else(|| {
         std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(dir_name))
      })
      .unwrap_or_else(|| {
         std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(dir_name)
      })
}

macro_rules! define_paths {
   ($($fn_name:ident: $path:literal),* $(,)?) => {
      $(
         pub fn $fn_name() -> &'static PathBuf {
            static ONCE: OnceLock<PathBuf> = OnceLock::new();
            ONCE.get_or_init(|| base_dir().join($path))
         }
      )*
   };
}

define_paths! {
   config_file_path: "config.toml",
   data_dir: "data",
}
