use std::io;

use thiserror::Error;

use crate::{store::StoreError, types::Amount};

/// Main error type for the marketplace core.
///
/// Domain variants are expected outcomes that the caller decides how to
/// surface. `Persistence` is the only infrastructure failure and always means
/// the enclosing transaction was rolled back.
#[derive(Debug, Error)]
pub enum Error {
   /// Every active address is held by a live lease.
   #[error("no deposit address available")]
   NoAddressAvailable,

   /// The address is not part of the pool.
   #[error("unknown deposit address: {0}")]
   UnknownAddress(String),

   /// The item does not exist.
   #[error("item not found: {0}")]
   ItemNotFound(String),

   /// The item has already been settled or withdrawn.
   #[error("item is not for sale: {0}")]
   ItemNotForSale(String),

   /// The quoted price disagrees with the listed price beyond tolerance.
   #[error("price mismatch: quoted {quoted}, listed {listed}")]
   PriceMismatch { quoted: Amount, listed: Amount },

   /// Missing or malformed input.
   #[error("invalid input: {0}")]
   Validation(String),

   /// No identity could be resolved from the request credential.
   #[error("authentication required")]
   Unauthorized,

   /// The identity may not perform the operation.
   #[error("forbidden: {0}")]
   Forbidden(&'static str),

   /// Store-level failure; the transaction was rolled back.
   #[error("persistence failure: {0}")]
   Persistence(#[from] StoreError),

   /// Configuration-related error occurred.
   #[error("config error: {0}")]
   Config(#[from] ConfigError),

   /// I/O error occurred during file or network operations.
   #[error("io error: {0}")]
   Io(#[from] io::Error),

   /// JSON serialization error occurred.
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   /// A blocking store task panicked or was cancelled.
   #[error("background task failed: {0}")]
   Join(#[from] tokio::task::JoinError),

   /// Server error occurred during a specific operation.
   #[error("server error during {op}: {reason}")]
   Server { op: &'static str, reason: String },
}

impl Error {
   pub fn validation(reason: impl Into<String>) -> Self {
      Self::Validation(reason.into())
   }

   /// Stable taxonomy name used in API error bodies.
   pub const fn kind(&self) -> &'static str {
      match self {
         Self::NoAddressAvailable => "NoAddressAvailable",
         Self::UnknownAddress(_) => "UnknownAddress",
         Self::ItemNotFound(_) => "ItemNotFound",
         Self::ItemNotForSale(_) => "ItemNotForSale",
         Self::PriceMismatch { .. } => "PriceMismatch",
         Self::Validation(_) => "ValidationError",
         Self::Unauthorized => "Unauthorized",
         Self::Forbidden(_) => "Forbidden",
         Self::Persistence(_) => "PersistenceFailure",
         Self::Config(_) | Self::Io(_) | Self::Json(_) | Self::Join(_) | Self::Server { .. } => {
            "InternalError"
         },
      }
   }

   pub const fn exit_code(&self) -> i32 {
      match self {
         Self::NoAddressAvailable
         | Self::UnknownAddress(_)
         | Self::ItemNotFound(_)
         | Self::ItemNotForSale(_)
         | Self::PriceMismatch { .. }
         | Self::Validation(_) => 2,
         Self::Unauthorized | Self::Forbidden(_) => 3,
         Self::Persistence(_) => 10,
         Self::Config(_) => 11,
         _ => 1,
      }
   }
}

impl From<rusqlite::Error> for Error {
   fn from(e: rusqlite::Error) -> Self {
      Self::Persistence(StoreError::Sqlite(e))
   }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
   /// A configuration value is out of range.
   #[error("invalid config: {0}")]
   Invalid(String),

   /// The configuration sources could not be merged or parsed.
   #[error("failed to load config: {0}")]
   Load(#[source] Box<figment::Error>),
}

/// Standard result type using [`enum@Error`] as the default error type
pub type Result<T, E = Error> = std::result::Result<T, E>;
