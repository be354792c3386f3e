#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use marketcore::{
   config::MarketSettings,
   lease::AddressLeasePool,
   ledger::SettlementLedger,
   store::{Store, items::ItemCatalog},
   types::{Amount, CommissionRate, Item},
};
use tempfile::TempDir;

pub const ADDR_A: &str = "0x00000000000000000000000000000000000000aa";
pub const ADDR_B: &str = "0x00000000000000000000000000000000000000bb";
pub const ADDR_C: &str = "0x00000000000000000000000000000000000000cc";

pub const SELLER: &str = "0x1111111111111111111111111111111111111111";
pub const BUYER: &str = "0x2222222222222222222222222222222222222222";
pub const OTHER_BUYER: &str = "0x3333333333333333333333333333333333333333";

/// A store in a fresh temp dir. Keep the `TempDir` alive for the test.
pub struct Fixture {
   pub dir:     TempDir,
   pub store:   Store,
   pub pool:    AddressLeasePool,
   pub ledger:  SettlementLedger,
   pub catalog: ItemCatalog,
}

impl Fixture {
   pub fn new() -> Self {
      let dir = TempDir::new().expect("temp dir");
      let store = open_store(&dir);
      Self {
         pool: AddressLeasePool::new(store.clone()),
         ledger: SettlementLedger::new(store.clone()),
         catalog: ItemCatalog::new(store.clone()),
         store,
         dir,
      }
   }

   /// A second, independent handle on the same database file.
   pub fn reopen(&self) -> Store {
      open_store(&self.dir)
   }

   pub fn seed_pool(&self, addresses: &[&str]) {
      self
         .pool
         .add_addresses(addresses, t0())
         .expect("seed pool");
   }

   pub fn list_item(&self, id: &str, owner: &str, eth: f64) {
      let price = Amount::from_eth(eth).expect("price");
      self
         .catalog
         .insert(&Item::listed(id, owner, price), t0())
         .expect("list item");
   }
}

pub fn open_store(dir: &TempDir) -> Store {
   Store::open(dir.path().join("market.db"), Duration::from_secs(10)).expect("open store")
}

/// Fixed reference instant so lease arithmetic is deterministic.
pub fn t0() -> DateTime<Utc> {
   Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single().expect("valid instant")
}

pub fn at(secs: i64) -> DateTime<Utc> {
   t0() + chrono::Duration::seconds(secs)
}

pub fn settings(commission_bps: u32) -> MarketSettings {
   MarketSettings {
      commission: CommissionRate::from_bps(commission_bps).expect("bps"),
      ..MarketSettings::default()
   }
}

pub fn eth(value: f64) -> Amount {
   Amount::from_eth(value).expect("amount")
}
