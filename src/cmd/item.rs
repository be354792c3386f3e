//! Catalog seeding for fixed-price listings.

use chrono::Utc;
use console::style;

use crate::{
   Result,
   cmd::Context,
   store::items::ItemCatalog,
   types::{Amount, Item, canonical_account},
};

pub fn add(ctx: &Context, id: &str, owner: &str, price_eth: f64) -> Result<()> {
   let price = Amount::from_eth(price_eth)?;
   let item = Item::listed(id.trim(), canonical_account(owner)?, price);
   ItemCatalog::new(ctx.store.clone()).insert(&item, Utc::now())?;
   println!(
      "{} {} {}",
      style("Listed").green().bold(),
      item.id,
      style(format!("({price}, owner {})", item.owner)).dim()
   );
   Ok(())
}
