mod support;

use marketcore::{
   Error,
   types::{ItemStatus, SaleRequest},
};
use support::{BUYER, Fixture, OTHER_BUYER, SELLER, at, eth, settings};

fn request(item_id: &str, buyer: &str, price: f64) -> SaleRequest {
   SaleRequest { item_id: item_id.to_string(), buyer: buyer.to_string(), price_quote: eth(price) }
}

#[test]
fn fifteen_percent_split_on_two_eth() {
   let fx = Fixture::new();
   fx.list_item("nft-1", SELLER, 2.0);

   let receipt = fx
      .ledger
      .settle_sale(&request("nft-1", BUYER, 2.0), &settings(1500), at(10))
      .expect("settle");
   assert_eq!(receipt.commission, eth(0.30));
   assert_eq!(receipt.seller_net, eth(1.70));
   assert_eq!(receipt.seller, SELLER);
   assert_eq!(receipt.buyer, BUYER);

   let rows = fx.ledger.entries_for_item("nft-1").expect("entries");
   assert_eq!(rows.len(), 2);
   assert_eq!(rows[0].account_id, SELLER);
   assert_eq!(rows[0].amount, eth(1.70));
   assert_eq!(rows[1].account_id, "platform");
   assert_eq!(rows[1].amount, eth(0.30));
   assert_eq!(rows[0].amount.gwei() + rows[1].amount.gwei(), eth(2.0).gwei());
   assert_eq!([rows[0].id, rows[1].id], receipt.entry_ids);
   assert!(rows.iter().all(|r| r.created_at == at(10)));

   let item = fx.catalog.get("nft-1").expect("get").expect("item exists");
   assert_eq!(item.owner, BUYER);
   assert_eq!(item.status, ItemStatus::Sold);
   assert!(!item.status.is_sale_eligible());
   assert!(!item.is_auction);
   assert_eq!(item.current_bid, None);

   let err = fx
      .ledger
      .settle_sale(&request("nft-1", OTHER_BUYER, 2.0), &settings(1500), at(20))
      .unwrap_err();
   assert!(matches!(err, Error::ItemNotForSale(_)), "got {err:?}");
   assert_eq!(fx.ledger.entries_for_item("nft-1").expect("entries").len(), 2);
}

#[test]
fn commission_rounds_down() {
   let fx = Fixture::new();
   fx.list_item("odd", SELLER, 0.000000007);

   let receipt = fx
      .ledger
      .settle_sale(&request("odd", BUYER, 0.000000007), &settings(1500), at(0))
      .expect("settle");
   // 7 gwei * 15% = 1.05 gwei, floored.
   assert_eq!(receipt.commission.gwei(), 1);
   assert_eq!(receipt.seller_net.gwei(), 6);
}

#[test]
fn full_commission_leaves_seller_zero() {
   let fx = Fixture::new();
   fx.list_item("nft-1", SELLER, 1.0);

   let receipt = fx
      .ledger
      .settle_sale(&request("nft-1", BUYER, 1.0), &settings(10_000), at(0))
      .expect("settle");
   assert_eq!(receipt.seller_net.gwei(), 0);
   assert_eq!(receipt.commission, eth(1.0));
}

#[test]
fn unknown_item_is_not_found() {
   let fx = Fixture::new();
   let err = fx
      .ledger
      .settle_sale(&request("ghost", BUYER, 1.0), &settings(1500), at(0))
      .unwrap_err();
   assert!(matches!(err, Error::ItemNotFound(ref id) if id == "ghost"));
}

#[test]
fn stale_quote_is_rejected_without_side_effects() {
   let fx = Fixture::new();
   fx.list_item("nft-1", SELLER, 2.0);

   let err = fx
      .ledger
      .settle_sale(&request("nft-1", BUYER, 1.5), &settings(1500), at(0))
      .unwrap_err();
   assert!(matches!(
      err,
      Error::PriceMismatch { quoted, listed } if quoted == eth(1.5) && listed == eth(2.0)
   ));

   let item = fx.catalog.get("nft-1").expect("get").expect("item");
   assert_eq!(item.status, ItemStatus::Listed);
   assert_eq!(item.owner, SELLER);
   assert!(fx.ledger.recent(10).expect("recent").is_empty());
}

#[test]
fn failed_posting_rolls_back_transfer() {
   let fx = Fixture::new();
   fx.list_item("nft-1", SELLER, 2.0);
   fx.store
      .write_tx(|tx| {
         tx.execute_batch(
            "CREATE TRIGGER reject_platform BEFORE INSERT ON ledger_entries
             WHEN NEW.account_id = 'platform'
             BEGIN SELECT RAISE(ABORT, 'platform account frozen'); END;",
         )?;
         Ok(())
      })
      .expect("install trigger");

   let err = fx
      .ledger
      .settle_sale(&request("nft-1", BUYER, 2.0), &settings(1500), at(0))
      .unwrap_err();
   assert!(matches!(err, Error::Persistence(_)), "got {err:?}");
   assert_eq!(err.kind(), "PersistenceFailure");

   let item = fx.catalog.get("nft-1").expect("get").expect("item");
   assert_eq!(item.owner, SELLER);
   assert_eq!(item.status, ItemStatus::Listed);
   assert!(fx.ledger.entries_for_item("nft-1").expect("entries").is_empty());

   fx.store
      .write_tx(|tx| {
         tx.execute_batch("DROP TRIGGER reject_platform;")?;
         Ok(())
      })
      .expect("drop trigger");
   fx.ledger
      .settle_sale(&request("nft-1", BUYER, 2.0), &settings(1500), at(1))
      .expect("retry succeeds");
}

#[test]
fn ledger_rows_cannot_be_edited() {
   let fx = Fixture::new();
   fx.list_item("nft-1", SELLER, 1.0);
   fx.ledger
      .settle_sale(&request("nft-1", BUYER, 1.0), &settings(1500), at(0))
      .expect("settle");

   let update = fx.store.write_tx(|tx| {
      tx.execute("UPDATE ledger_entries SET amount = 0", [])?;
      Ok(())
   });
   assert!(matches!(update, Err(Error::Persistence(_))));

   let delete = fx.store.write_tx(|tx| {
      tx.execute("DELETE FROM ledger_entries", [])?;
      Ok(())
   });
   assert!(matches!(delete, Err(Error::Persistence(_))));
   assert_eq!(fx.ledger.entries_for_item("nft-1").expect("entries").len(), 2);
}

#[test]
fn settings_snapshot_is_honoured_per_call() {
   let fx = Fixture::new();
   fx.list_item("a", SELLER, 1.0);
   fx.list_item("b", SELLER, 1.0);

   let low = fx
      .ledger
      .settle_sale(&request("a", BUYER, 1.0), &settings(100), at(0))
      .expect("a");
   let high = fx
      .ledger
      .settle_sale(&request("b", BUYER, 1.0), &settings(2500), at(0))
      .expect("b");
   assert_eq!(low.commission, eth(0.01));
   assert_eq!(high.commission, eth(0.25));
}

#[test]
fn owner_cannot_buy_back_under_different_case() {
   let fx = Fixture::new();
   let owner = "0xABCDEF0000000000000000000000000000000001";
   fx.list_item("nft-1", owner, 1.0);

   let err = fx
      .ledger
      .settle_sale(&request("nft-1", &owner.to_lowercase(), 1.0), &settings(1500), at(0))
      .unwrap_err();
   assert_eq!(err.kind(), "ValidationError", "got {err:?}");

   let item = fx.catalog.get("nft-1").expect("get").expect("item");
   assert_eq!(item.owner, owner.to_lowercase());
   assert_eq!(item.status, ItemStatus::Listed);
   assert!(fx.ledger.entries_for_item("nft-1").expect("entries").is_empty());
}

#[test]
fn buyer_address_is_stored_lowercase() {
   let fx = Fixture::new();
   fx.list_item("nft-1", SELLER, 1.0);

   let buyer = "0xABCDEF0000000000000000000000000000000002";
   let receipt = fx
      .ledger
      .settle_sale(&request("nft-1", buyer, 1.0), &settings(1500), at(0))
      .expect("settle");
   assert_eq!(receipt.buyer, buyer.to_lowercase());
   let item = fx.catalog.get("nft-1").expect("get").expect("item");
   assert_eq!(item.owner, buyer.to_lowercase());
}
