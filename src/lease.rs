//! Deposit-address lease pool (exclusive, time-bounded assignment).
//!
//! A lease is granted with a single conditional `UPDATE` inside an `IMMEDIATE`
//! transaction and the grant is confirmed by its affected-row count. Lapsed
//! leases are reclaimed lazily by the next acquisition, or by the optional
//! janitor task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
   Result,
   error::Error,
   store::{Store, StoreError, from_millis, to_millis, truncate_to_millis},
   types::{Lease, PoolEntry, normalize_address},
};

const RECLAIM_SQL: &str = "UPDATE deposit_addresses
   SET leased_to = NULL, lease_expires_at = NULL
 WHERE lease_expires_at IS NOT NULL AND lease_expires_at <= ?1";

// The outer predicate repeats the inner one so the row only flips while it
// is still free.
const CLAIM_SQL: &str = "UPDATE deposit_addresses
   SET leased_to = ?1, lease_expires_at = ?2
 WHERE address = (
          SELECT address FROM deposit_addresses
           WHERE active = 1 AND leased_to IS NULL
           ORDER BY created_at, rowid
           LIMIT 1)
   AND active = 1
   AND leased_to IS NULL";

#[derive(Debug, Clone)]
pub struct AddressLeasePool {
   store: Store,
}

impl AddressLeasePool {
   pub const fn new(store: Store) -> Self {
      Self { store }
   }

   /// Leases an address to `holder` for `ttl`.
   ///
   /// A holder that already has a live lease gets the same lease back
   /// unchanged. Fails with `NoAddressAvailable` when every active address is
   /// held by a live lease.
   pub fn acquire_lease(&self, holder: &str, ttl: Duration, now: DateTime<Utc>) -> Result<Lease> {
      let holder = holder.trim();
      if holder.is_empty() {
         return Err(Error::validation("lease holder is required"));
      }
      let expires_at = chrono::Duration::from_std(ttl)
         .ok()
         .filter(|ttl| *ttl > chrono::Duration::zero())
         .and_then(|ttl| now.checked_add_signed(ttl))
         .map(truncate_to_millis)
         .ok_or_else(|| Error::validation("lease ttl must be positive and in range"))?;
      let now_ms = to_millis(now);

      let (outcome, reclaimed) = self.store.write_tx(|tx| {
         let reclaimed = tx.execute(RECLAIM_SQL, params![now_ms])?;

         if let Some(existing) = held_lease(tx, holder)? {
            return Ok((Acquired::Existing(existing), reclaimed));
         }

         let claimed = tx.execute(CLAIM_SQL, params![holder, to_millis(expires_at)])?;
         match claimed {
            0 => Ok((Acquired::Exhausted, reclaimed)),
            1 => {
               let lease = held_lease(tx, holder)?.ok_or_else(|| StoreError::Corrupt {
                  table:  "deposit_addresses",
                  reason: format!("claimed row for {holder} not found"),
               })?;
               Ok((Acquired::Granted(lease), reclaimed))
            },
            n => Err(
               StoreError::Corrupt {
                  table:  "deposit_addresses",
                  reason: format!("claim touched {n} rows"),
               }
               .into(),
            ),
         }
      })?;

      if reclaimed > 0 {
         tracing::info!(reclaimed, "expired leases reclaimed");
      }
      match outcome {
         Acquired::Existing(lease) => {
            tracing::debug!(holder, address = %lease.address, "lease re-fetched");
            Ok(lease)
         },
         Acquired::Granted(lease) => {
            tracing::info!(
               holder,
               address = %lease.address,
               expires_at = %lease.expires_at,
               "lease granted"
            );
            Ok(lease)
         },
         Acquired::Exhausted => {
            tracing::warn!(holder, "deposit address pool exhausted");
            Err(Error::NoAddressAvailable)
         },
      }
   }

   /// Clears any lease on `address`. Releasing an unleased or unknown address
   /// succeeds without effect.
   pub fn release_lease(&self, address: &str) -> Result<()> {
      let address = normalize_address(address)?;
      let released = self.store.write_tx(|tx| {
         Ok(tx.execute(
            "UPDATE deposit_addresses
                SET leased_to = NULL, lease_expires_at = NULL
              WHERE address = ?1 AND leased_to IS NOT NULL",
            params![address],
         )?)
      })?;
      if released > 0 {
         tracing::info!(address = %address, "lease released");
      } else {
         tracing::debug!(address = %address, "release on unleased address");
      }
      Ok(())
   }

   /// Toggles lease eligibility. A live lease on the address is left intact.
   pub fn set_active(&self, address: &str, active: bool) -> Result<()> {
      let address = normalize_address(address)?;
      let changed = self.store.write_tx(|tx| {
         Ok(tx.execute(
            "UPDATE deposit_addresses SET active = ?1 WHERE address = ?2",
            params![active, address],
         )?)
      })?;
      if changed == 0 {
         return Err(Error::UnknownAddress(address));
      }
      tracing::info!(address = %address, active, "deposit address toggled");
      Ok(())
   }

   /// Seeds new active addresses; addresses already present are untouched.
   ///
   /// The whole batch is rejected if any address is malformed.
   pub fn add_addresses<I, S>(&self, addresses: I, now: DateTime<Utc>) -> Result<usize>
   where
      I: IntoIterator<Item = S>,
      S: AsRef<str>,
   {
      let normalized = addresses
         .into_iter()
         .map(|a| normalize_address(a.as_ref()))
         .collect::<Result<Vec<_>>>()?;
      let inserted = self.store.write_tx(|tx| {
         let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO deposit_addresses (address, active, created_at)
             VALUES (?1, 1, ?2)",
         )?;
         let mut inserted = 0;
         for address in &normalized {
            inserted += stmt.execute(params![address, to_millis(now)])?;
         }
         Ok(inserted)
      })?;
      tracing::info!(inserted, requested = normalized.len(), "deposit addresses added");
      Ok(inserted)
   }

   /// Every address in claim order.
   pub fn list(&self) -> Result<Vec<PoolEntry>> {
      self.store.read(|conn| {
         let mut stmt = conn.prepare(
            "SELECT address, active, leased_to, lease_expires_at
               FROM deposit_addresses
              ORDER BY created_at, rowid",
         )?;
         let rows = stmt.query_map([], |row| {
            Ok((
               row.get::<_, String>(0)?,
               row.get::<_, bool>(1)?,
               row.get::<_, Option<String>>(2)?,
               row.get::<_, Option<i64>>(3)?,
            ))
         })?;
         let mut entries = Vec::new();
         for row in rows {
            let (address, active, leased_to, expires_ms) = row?;
            entries.push(PoolEntry {
               address,
               active,
               leased_to,
               lease_expires_at: expires_ms
                  .map(|ms| from_millis("deposit_addresses", ms))
                  .transpose()?,
            });
         }
         Ok(entries)
      })
   }

   /// The live lease held by `holder`, if any. Read-only.
   pub fn lease_of(&self, holder: &str, now: DateTime<Utc>) -> Result<Option<Lease>> {
      let lease = self.store.read(|conn| held_lease(conn, holder))?;
      Ok(lease.filter(|lease| lease.expires_at > now))
   }

   /// Clears every lapsed lease and returns how many were cleared.
   pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
      let now_ms = to_millis(now);
      self
         .store
         .write_tx(|tx| Ok(tx.execute(RECLAIM_SQL, params![now_ms])?))
   }
}

enum Acquired {
   Existing(Lease),
   Granted(Lease),
   Exhausted,
}

fn held_lease(conn: &Connection, holder: &str) -> Result<Option<Lease>> {
   let row = conn
      .query_row(
         "SELECT address, lease_expires_at FROM deposit_addresses WHERE leased_to = ?1",
         params![holder],
         |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
      )
      .optional()?;
   row.map(|(address, expires_ms)| {
      Ok(Lease { address, expires_at: from_millis("deposit_addresses", expires_ms)? })
   })
   .transpose()
}

/// Periodically sweeps lapsed leases until `token` is cancelled.
pub fn spawn_janitor(
   pool: AddressLeasePool,
   interval: Duration,
   token: CancellationToken,
) -> JoinHandle<()> {
   tokio::spawn(async move {
      loop {
         tokio::select! {
            () = token.cancelled() => break,
            () = time::sleep(interval) => {
               let pool = pool.clone();
               match tokio::task::spawn_blocking(move || pool.sweep_expired(Utc::now())).await {
                  Ok(Ok(0)) => {},
                  Ok(Ok(swept)) => tracing::info!(swept, "expired leases swept"),
                  Ok(Err(err)) => tracing::warn!("lease sweep failed: {err}"),
                  Err(err) => tracing::warn!("lease sweep task failed: {err}"),
               }
            }
         }
      }
   })
}
