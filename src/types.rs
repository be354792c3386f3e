//! Domain types shared by the lease pool, the ledger and the HTTP layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, error::Error};

pub const GWEI_PER_ETH: i64 = 1_000_000_000;
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Value in gwei. All arithmetic on money happens on this integer form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
   pub const ZERO: Self = Self(0);

   pub const fn from_gwei(gwei: i64) -> Self {
      Self(gwei)
   }

   pub const fn gwei(self) -> i64 {
      self.0
   }

   /// Converts an ETH quantity as received over JSON, rounding to the nearest
   /// gwei.
   pub fn from_eth(eth: f64) -> Result<Self> {
      if !eth.is_finite() {
         return Err(Error::validation("amount must be a finite number"));
      }
      if eth < 0.0 {
         return Err(Error::validation("amount must not be negative"));
      }
      let gwei = (eth * GWEI_PER_ETH as f64).round();
      if gwei >= i64::MAX as f64 {
         return Err(Error::validation("amount is out of range"));
      }
      Ok(Self(gwei as i64))
   }

   pub fn as_eth(self) -> f64 {
      self.0 as f64 / GWEI_PER_ETH as f64
   }

   pub const fn abs_diff(self, other: Self) -> u64 {
      self.0.abs_diff(other.0)
   }

   pub const fn is_zero(self) -> bool {
      self.0 == 0
   }
}

impl fmt::Display for Amount {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let sign = if self.0 < 0 { "-" } else { "" };
      let abs = self.0.unsigned_abs();
      let per = GWEI_PER_ETH as u64;
      write!(f, "{sign}{}.{:09} ETH", abs / per, abs % per)
   }
}

/// Platform share of a sale, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionRate(u32);

impl CommissionRate {
   pub const ZERO: Self = Self(0);

   pub const fn from_bps(bps: u32) -> Option<Self> {
      if bps > BPS_DENOMINATOR { None } else { Some(Self(bps)) }
   }

   pub const fn bps(self) -> u32 {
      self.0
   }

   pub fn percent(self) -> f64 {
      f64::from(self.0) / 100.0
   }

   /// Splits a sale price into seller net and commission.
   ///
   /// The commission is floored to the gwei and the seller receives the
   /// remainder, so the two parts always sum to `price`.
   pub fn split(self, price: Amount) -> SaleSplit {
      let commission =
         (i128::from(price.gwei()) * i128::from(self.0) / i128::from(BPS_DENOMINATOR)) as i64;
      let seller_net = (price.gwei() - commission).max(0);
      SaleSplit { seller_net: Amount(seller_net), commission: Amount(commission) }
   }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleSplit {
   pub seller_net: Amount,
   pub commission: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
   User,
   Creator,
   Moderator,
   Admin,
}

/// Caller identity as resolved by an [`AuthGate`](crate::auth::AuthGate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
   pub id:   String,
   pub role: Role,
}

impl Identity {
   pub fn new(id: impl Into<String>, role: Role) -> Self {
      Self { id: id.into(), role }
   }

   pub fn is_admin(&self) -> bool {
      self.role == Role::Admin
   }
}

/// Validates a `0x`-prefixed 20-byte hex address and returns it lowercased.
pub fn normalize_address(raw: &str) -> Result<String> {
   let trimmed = raw.trim();
   let Some(hex) = trimmed
      .strip_prefix("0x")
      .or_else(|| trimmed.strip_prefix("0X"))
   else {
      return Err(Error::validation(format!("address must start with 0x: {trimmed:?}")));
   };
   if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
      return Err(Error::validation(format!("address must be 40 hex digits: {trimmed:?}")));
   }
   Ok(format!("0x{}", hex.to_ascii_lowercase()))
}

/// Canonical form of an account id. Anything written as a `0x` address must
/// be a valid one and is lowercased; other ids are only trimmed.
pub fn canonical_account(raw: &str) -> Result<String> {
   let trimmed = raw.trim();
   if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
      normalize_address(trimmed)
   } else {
      Ok(trimmed.to_string())
   }
}

/// Account ids compare without regard to hex letter case.
pub fn same_account(a: &str, b: &str) -> bool {
   a.trim().eq_ignore_ascii_case(b.trim())
}

/// A granted lease as returned to the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
   pub address:    String,
   pub expires_at: DateTime<Utc>,
}

/// One row of the deposit-address inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
   pub address:          String,
   pub active:           bool,
   pub leased_to:        Option<String>,
   pub lease_expires_at: Option<DateTime<Utc>>,
}

impl PoolEntry {
   /// A lease is live only while its expiry lies in the future.
   pub fn live_holder(&self, now: DateTime<Utc>) -> Option<&str> {
      match (&self.leased_to, self.lease_expires_at) {
         (Some(holder), Some(expires_at)) if expires_at > now => Some(holder.as_str()),
         _ => None,
      }
   }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
   Listed,
   Sold,
   Withdrawn,
}

impl ItemStatus {
   pub const fn as_str(self) -> &'static str {
      match self {
         Self::Listed => "listed",
         Self::Sold => "sold",
         Self::Withdrawn => "withdrawn",
      }
   }

   pub fn parse(raw: &str) -> Option<Self> {
      match raw {
         "listed" => Some(Self::Listed),
         "sold" => Some(Self::Sold),
         "withdrawn" => Some(Self::Withdrawn),
         _ => None,
      }
   }

   pub const fn is_sale_eligible(self) -> bool {
      matches!(self, Self::Listed)
   }
}

/// The slice of an item record that settlement reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
   pub id:          String,
   pub owner:       String,
   pub price:       Amount,
   pub status:      ItemStatus,
   pub is_auction:  bool,
   pub auction_end: Option<DateTime<Utc>>,
   pub current_bid: Option<Amount>,
}

impl Item {
   /// A fixed-price listing.
   pub fn listed(id: impl Into<String>, owner: impl Into<String>, price: Amount) -> Self {
      Self {
         id: id.into(),
         owner: owner.into(),
         price,
         status: ItemStatus::Listed,
         is_auction: false,
         auction_end: None,
         current_bid: None,
      }
   }
}

/// Append-only record of a value movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
   pub id:         i64,
   pub account_id: String,
   pub amount:     Amount,
   pub item_id:    Option<String>,
   pub created_at: DateTime<Utc>,
}

/// Input to a settlement.
#[derive(Debug, Clone)]
pub struct SaleRequest {
   pub item_id:     String,
   pub buyer:       String,
   pub price_quote: Amount,
}

/// Outcome of a committed settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
   pub item_id:    String,
   pub seller:     String,
   pub buyer:      String,
   pub seller_net: Amount,
   pub commission: Amount,
   pub entry_ids:  [i64; 2],
}
