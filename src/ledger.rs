//! Sale settlement: ownership transfer and payment split as one transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use crate::{
   Result,
   config::MarketSettings,
   error::Error,
   store::{Store, from_millis, items::load_item, to_millis},
   types::{
      Amount, LedgerEntry, SaleRequest, SettlementReceipt, canonical_account, same_account,
   },
};

const ENTRY_COLUMNS: &str = "id, account_id, amount, item_id, created_at";

#[derive(Debug, Clone)]
pub struct SettlementLedger {
   store: Store,
}

impl SettlementLedger {
   pub const fn new(store: Store) -> Self {
      Self { store }
   }

   /// Settles a sale of `request.item_id` to `request.buyer`.
   ///
   /// In one `IMMEDIATE` transaction: checks the item is still listed at the
   /// quoted price, hands it to the buyer, clears auction state, marks it
   /// sold and posts the seller and platform ledger rows. Nothing is applied
   /// unless all of it is.
   pub fn settle_sale(
      &self,
      request: &SaleRequest,
      settings: &MarketSettings,
      now: DateTime<Utc>,
   ) -> Result<SettlementReceipt> {
      let item_id = request.item_id.trim();
      if item_id.is_empty() {
         return Err(Error::validation("itemId is required"));
      }
      if request.buyer.trim().is_empty() {
         return Err(Error::validation("buyer is required"));
      }
      let buyer = canonical_account(&request.buyer)?;
      if request.price_quote.is_zero() || request.price_quote < Amount::ZERO {
         return Err(Error::validation("price must be positive"));
      }

      let now_ms = to_millis(now);
      let result = self.store.write_tx(|tx| {
         let item = load_item(tx, item_id)?.ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
         if !item.status.is_sale_eligible() {
            return Err(Error::ItemNotForSale(item.id));
         }
         if request.price_quote.abs_diff(item.price) > settings.price_tolerance.gwei() as u64 {
            return Err(Error::PriceMismatch { quoted: request.price_quote, listed: item.price });
         }
         if same_account(&item.owner, &buyer) {
            return Err(Error::validation(format!("buyer already owns item {}", item.id)));
         }

         let split = settings.commission.split(request.price_quote);

         let transferred = tx.execute(
            "UPDATE items
                SET owner = ?1, status = 'sold', is_auction = 0,
                    auction_end = NULL, current_bid = NULL, updated_at = ?2
              WHERE id = ?3 AND status = 'listed'",
            params![buyer, now_ms, item.id],
         )?;
         if transferred != 1 {
            return Err(Error::ItemNotForSale(item.id));
         }

         let seller_entry = append_entry(tx, &item.owner, split.seller_net, &item.id, now_ms)?;
         let platform_entry =
            append_entry(tx, &settings.platform_account_id, split.commission, &item.id, now_ms)?;

         Ok(SettlementReceipt {
            item_id:    item.id,
            seller:     item.owner,
            buyer:      buyer.clone(),
            seller_net: split.seller_net,
            commission: split.commission,
            entry_ids:  [seller_entry, platform_entry],
         })
      });

      match &result {
         Ok(receipt) => tracing::info!(
            item_id = %receipt.item_id,
            seller = %receipt.seller,
            buyer = %receipt.buyer,
            commission = %receipt.commission,
            seller_net = %receipt.seller_net,
            "sale settled"
         ),
         Err(err @ Error::Persistence(_)) => {
            tracing::warn!(item_id, "settlement rolled back: {err}");
         },
         Err(err) => tracing::debug!(item_id, kind = err.kind(), "settlement refused"),
      }
      result
   }

   /// Most recent ledger rows, newest first.
   pub fn recent(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
      let limit = i64::try_from(limit).unwrap_or(i64::MAX);
      self.store.read(|conn| {
         query_entries(
            conn,
            &format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries ORDER BY id DESC LIMIT ?1"),
            params![limit],
         )
      })
   }

   /// Rows posted for one item, in posting order.
   pub fn entries_for_item(&self, item_id: &str) -> Result<Vec<LedgerEntry>> {
      self.store.read(|conn| {
         query_entries(
            conn,
            &format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE item_id = ?1 ORDER BY id"),
            params![item_id],
         )
      })
   }
}

fn append_entry(
   conn: &Connection,
   account_id: &str,
   amount: Amount,
   item_id: &str,
   now_ms: i64,
) -> Result<i64> {
   conn.execute(
      "INSERT INTO ledger_entries (account_id, amount, item_id, created_at)
       VALUES (?1, ?2, ?3, ?4)",
      params![account_id, amount.gwei(), item_id, now_ms],
   )?;
   Ok(conn.last_insert_rowid())
}

fn query_entries(
   conn: &Connection,
   sql: &str,
   params: impl rusqlite::Params,
) -> Result<Vec<LedgerEntry>> {
   let mut stmt = conn.prepare(sql)?;
   let rows = stmt.query_map(params, raw_entry)?;
   let mut entries = Vec::new();
   for row in rows {
      let (id, account_id, amount, item_id, created_ms) = row?;
      entries.push(LedgerEntry {
         id,
         account_id,
         amount: Amount::from_gwei(amount),
         item_id,
         created_at: from_millis("ledger_entries", created_ms)?,
      });
   }
   Ok(entries)
}

fn raw_entry(row: &Row<'_>) -> rusqlite::Result<(i64, String, i64, Option<String>, i64)> {
   Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}
