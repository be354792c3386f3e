//! Races between independent store handles, standing in for separate server
//! processes sharing one database.

mod support;

use std::{
   collections::HashSet,
   sync::Barrier,
   thread,
   time::Duration,
};

use marketcore::{
   Error,
   lease::AddressLeasePool,
   ledger::SettlementLedger,
   types::SaleRequest,
};
use support::{ADDR_A, ADDR_B, ADDR_C, BUYER, Fixture, OTHER_BUYER, SELLER, at, eth, settings};

const TTL: Duration = Duration::from_secs(300);

#[test]
fn last_address_goes_to_exactly_one_holder() {
   let fx = Fixture::new();
   fx.seed_pool(&[ADDR_A]);

   let barrier = Barrier::new(8);
   let results: Vec<_> = thread::scope(|s| {
      let handles: Vec<_> = (0..8)
         .map(|i| {
            let pool = AddressLeasePool::new(fx.reopen());
            let barrier = &barrier;
            s.spawn(move || {
               barrier.wait();
               pool.acquire_lease(&format!("u{i}"), TTL, at(0))
            })
         })
         .collect();
      handles
         .into_iter()
         .map(|h| h.join().expect("thread"))
         .collect()
   });

   let granted = results.iter().filter(|r| r.is_ok()).count();
   assert_eq!(granted, 1, "results: {results:?}");
   assert!(
      results
         .iter()
         .filter_map(|r| r.as_ref().err())
         .all(|e| matches!(e, Error::NoAddressAvailable))
   );
}

#[test]
fn leases_never_overlap_under_contention() {
   let fx = Fixture::new();
   fx.seed_pool(&[ADDR_A, ADDR_B, ADDR_C]);

   let barrier = Barrier::new(12);
   let leases: Vec<_> = thread::scope(|s| {
      let handles: Vec<_> = (0..12)
         .map(|i| {
            let pool = AddressLeasePool::new(fx.reopen());
            let barrier = &barrier;
            s.spawn(move || {
               barrier.wait();
               // Half the callers ask twice to exercise the re-fetch path.
               let holder = format!("u{}", i % 6);
               pool.acquire_lease(&holder, TTL, at(0)).ok().map(|l| (holder, l))
            })
         })
         .collect();
      handles
         .into_iter()
         .filter_map(|h| h.join().expect("thread"))
         .collect()
   });

   let holders: HashSet<_> = leases.iter().map(|(h, _)| h.clone()).collect();
   let addresses: HashSet<_> = leases.iter().map(|(_, l)| l.address.clone()).collect();
   assert_eq!(holders.len(), 3);
   assert_eq!(addresses.len(), 3);
   for (holder, lease) in &leases {
      let current = fx.pool.lease_of(holder, at(1)).expect("lease_of");
      assert_eq!(current.as_ref(), Some(lease));
   }
}

#[test]
fn concurrent_purchases_settle_once() {
   let fx = Fixture::new();
   fx.list_item("nft-1", SELLER, 2.0);

   let barrier = Barrier::new(2);
   let results: Vec<_> = thread::scope(|s| {
      let handles: Vec<_> = [BUYER, OTHER_BUYER]
         .into_iter()
         .map(|buyer| {
            let ledger = SettlementLedger::new(fx.reopen());
            let barrier = &barrier;
            s.spawn(move || {
               let request = SaleRequest {
                  item_id:     "nft-1".to_string(),
                  buyer:       buyer.to_string(),
                  price_quote: eth(2.0),
               };
               barrier.wait();
               ledger.settle_sale(&request, &settings(1500), at(0))
            })
         })
         .collect();
      handles
         .into_iter()
         .map(|h| h.join().expect("thread"))
         .collect()
   });

   let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
   assert_eq!(winners.len(), 1, "results: {results:?}");
   assert!(
      results
         .iter()
         .filter_map(|r| r.as_ref().err())
         .all(|e| matches!(e, Error::ItemNotForSale(_)))
   );

   let item = fx.catalog.get("nft-1").expect("get").expect("item");
   assert_eq!(item.owner, winners[0].buyer);
   assert_eq!(fx.ledger.entries_for_item("nft-1").expect("entries").len(), 2);
}

#[test]
fn many_sales_keep_ledger_balanced() {
   let fx = Fixture::new();
   for i in 0..10 {
      fx.list_item(&format!("nft-{i}"), SELLER, 0.5 + f64::from(i) / 10.0);
   }

   thread::scope(|s| {
      for worker in 0..4 {
         let ledger = SettlementLedger::new(fx.reopen());
         s.spawn(move || {
            for i in 0..10 {
               let request = SaleRequest {
                  item_id:     format!("nft-{i}"),
                  buyer:       format!("0x{worker:040x}"),
                  price_quote: eth(0.5 + f64::from(i) / 10.0),
               };
               let _ = ledger.settle_sale(&request, &settings(1500), at(0));
            }
         });
      }
   });

   let entries = fx.ledger.recent(100).expect("recent");
   assert_eq!(entries.len(), 20);
   for i in 0..10 {
      let id = format!("nft-{i}");
      let rows: Vec<_> = entries
         .iter()
         .filter(|e| e.item_id.as_deref() == Some(id.as_str()))
         .collect();
      assert_eq!(rows.len(), 2, "item {id}");
      let total: i64 = rows.iter().map(|e| e.amount.gwei()).sum();
      assert_eq!(total, eth(0.5 + f64::from(i) / 10.0).gwei());
   }
}
