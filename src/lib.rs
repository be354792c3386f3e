//! Deposit-address leasing and sale settlement for an NFT marketplace.
//!
//! [`lease::AddressLeasePool`] hands out exclusive, time-bounded deposit
//! addresses. [`ledger::SettlementLedger`] transfers a sold item and posts the
//! seller and platform ledger rows as a single commit. Both sit on a SQLite
//! [`store::Store`] and are served over HTTP by [`api::router`].

pub mod api;
pub mod auth;
pub mod cmd;
pub mod config;
pub mod error;
pub mod lease;
pub mod ledger;
pub mod store;
pub mod types;

pub use error::{Error, Result};
