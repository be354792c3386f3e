//! Item rows. Listing and editing items belongs to the CRUD layer; this is the
//! slice settlement needs plus seeding for admin tooling.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{Store, StoreError, from_millis, to_millis};
use crate::{
   Result,
   error::Error,
   types::{Amount, Item, ItemStatus, canonical_account},
};

const ITEM_COLUMNS: &str = "id, owner, price, status, is_auction, auction_end, current_bid";

#[derive(Debug, Clone)]
pub struct ItemCatalog {
   store: Store,
}

impl ItemCatalog {
   pub const fn new(store: Store) -> Self {
      Self { store }
   }

   /// Inserts a new item with its owner in canonical form. Fails with
   /// `Validation` if the id is taken.
   pub fn insert(&self, item: &Item, now: DateTime<Utc>) -> Result<()> {
      if item.id.trim().is_empty() || item.owner.trim().is_empty() {
         return Err(Error::validation("item id and owner are required"));
      }
      let owner = canonical_account(&item.owner)?;
      self.store.write_tx(|tx| {
         let inserted = tx.execute(
            "INSERT OR IGNORE INTO items
               (id, owner, price, status, is_auction, auction_end, current_bid, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
               item.id,
               owner,
               item.price.gwei(),
               item.status.as_str(),
               item.is_auction,
               item.auction_end.map(to_millis),
               item.current_bid.map(Amount::gwei),
               to_millis(now),
            ],
         )?;
         if inserted == 0 {
            return Err(Error::validation(format!("item already exists: {}", item.id)));
         }
         Ok(())
      })
   }

   pub fn get(&self, id: &str) -> Result<Option<Item>> {
      self.store.read(|conn| load_item(conn, id))
   }
}

pub(crate) fn load_item(conn: &Connection, id: &str) -> Result<Option<Item>> {
   let raw = conn
      .query_row(
         &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
         params![id],
         RawItem::from_row,
      )
      .optional()?;
   raw.map(RawItem::into_item).transpose()
}

struct RawItem {
   id:          String,
   owner:       String,
   price:       i64,
   status:      String,
   is_auction:  bool,
   auction_end: Option<i64>,
   current_bid: Option<i64>,
}

impl RawItem {
   fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
      Ok(Self {
         id:          row.get(0)?,
         owner:       row.get(1)?,
         price:       row.get(2)?,
         status:      row.get(3)?,
         is_auction:  row.get(4)?,
         auction_end: row.get(5)?,
         current_bid: row.get(6)?,
      })
   }

   fn into_item(self) -> Result<Item> {
      let status = ItemStatus::parse(&self.status).ok_or_else(|| StoreError::Corrupt {
         table:  "items",
         reason: format!("unknown status {:?} for {}", self.status, self.id),
      })?;
      Ok(Item {
         id: self.id,
         owner: self.owner,
         price: Amount::from_gwei(self.price),
         status,
         is_auction: self.is_auction,
         auction_end: self
            .auction_end
            .map(|ms| from_millis("items", ms))
            .transpose()?,
         current_bid: self.current_bid.map(Amount::from_gwei),
      })
   }
}

#[cfg(test)]
mod tests {
   use tempfile::TempDir;

   use super::*;

   #[test]
   fn insert_then_get() {
      let dir = TempDir::new().expect("temp dir");
      let store = Store::open(dir.path().join("m.db"), Store::DEFAULT_BUSY_TIMEOUT).expect("open");
      let catalog = ItemCatalog::new(store);
      let now = Utc::now();

      let mut item = Item::listed("item-1", "seller", Amount::from_gwei(42));
      item.is_auction = true;
      item.current_bid = Some(Amount::from_gwei(40));
      catalog.insert(&item, now).expect("insert");

      let loaded = catalog.get("item-1").expect("get").expect("present");
      assert_eq!(loaded, item);
      assert!(catalog.get("missing").expect("get").is_none());
   }

   #[test]
   fn duplicate_insert_is_rejected() {
      let dir = TempDir::new().expect("temp dir");
      let store = Store::open(dir.path().join("m.db"), Store::DEFAULT_BUSY_TIMEOUT).expect("open");
      let catalog = ItemCatalog::new(store);
      let item = Item::listed("item-1", "seller", Amount::from_gwei(1));
      catalog.insert(&item, Utc::now()).expect("first");
      let err = catalog.insert(&item, Utc::now()).unwrap_err();
      assert_eq!(err.kind(), "ValidationError");
   }

   #[test]
   fn address_owners_are_stored_lowercase() {
      let dir = TempDir::new().expect("temp dir");
      let store = Store::open(dir.path().join("m.db"), Store::DEFAULT_BUSY_TIMEOUT).expect("open");
      let catalog = ItemCatalog::new(store);
      let owner = "0xABCDEF0000000000000000000000000000000001";
      catalog
         .insert(&Item::listed("item-1", owner, Amount::from_gwei(1)), Utc::now())
         .expect("insert");
      let loaded = catalog.get("item-1").expect("get").expect("present");
      assert_eq!(loaded.owner, owner.to_lowercase());

      let err = catalog
         .insert(&Item::listed("item-2", "0xBAD", Amount::from_gwei(1)), Utc::now())
         .unwrap_err();
      assert_eq!(err.kind(), "ValidationError");
   }
}
