//! Deposit-address pool administration.

use chrono::Utc;
use console::style;

use crate::{
   Result,
   api::PoolEntryDto,
   cmd::Context,
   lease::AddressLeasePool,
};

/// Seeds addresses into the pool.
pub fn add(ctx: &Context, addresses: &[String]) -> Result<()> {
   let pool = AddressLeasePool::new(ctx.store.clone());
   let inserted = pool.add_addresses(addresses, Utc::now())?;
   let skipped = addresses.len() - inserted;
   println!(
      "{} {inserted} address(es){}",
      style("Added").green().bold(),
      if skipped > 0 {
         style(format!(", {skipped} already present")).dim().to_string()
      } else {
         String::new()
      }
   );
   Ok(())
}

/// Prints the pool with each address's live holder.
pub fn list(ctx: &Context, json: bool) -> Result<()> {
   let pool = AddressLeasePool::new(ctx.store.clone());
   let now = Utc::now();
   let entries = pool.list()?;

   if json {
      let dtos: Vec<_> = entries
         .into_iter()
         .map(|e| PoolEntryDto::from_entry(e, now))
         .collect();
      println!("{}", serde_json::to_string_pretty(&dtos)?);
      return Ok(());
   }

   if entries.is_empty() {
      println!("{}", style("Pool is empty").dim());
      return Ok(());
   }

   for entry in &entries {
      let marker = match (entry.active, entry.live_holder(now)) {
         (false, _) => style("○").dim(),
         (true, Some(_)) => style("●").yellow(),
         (true, None) => style("●").green(),
      };
      let detail = match (entry.live_holder(now), entry.lease_expires_at) {
         (Some(holder), Some(until)) => format!("leased to {holder} until {}", until.to_rfc3339()),
         _ if !entry.active => "inactive".to_string(),
         _ => "free".to_string(),
      };
      println!("  {marker} {} {}", entry.address, style(format!("({detail})")).dim());
   }
   Ok(())
}

pub fn toggle(ctx: &Context, address: &str, active: bool) -> Result<()> {
   AddressLeasePool::new(ctx.store.clone()).set_active(address, active)?;
   let state = if active { style("active").green() } else { style("inactive").red() };
   println!("{address} is now {state}");
   Ok(())
}

/// Clears lapsed leases immediately.
pub fn sweep(ctx: &Context) -> Result<()> {
   let swept = AddressLeasePool::new(ctx.store.clone()).sweep_expired(Utc::now())?;
   println!("{} {swept} expired lease(s)", style("Swept").green().bold());
   Ok(())
}
