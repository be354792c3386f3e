//! Ledger inspection command.

use console::style;

use crate::{Result, api::LedgerEntryDto, cmd::Context, ledger::SettlementLedger};

/// Prints the newest ledger rows.
pub fn execute(ctx: &Context, limit: Option<usize>, json: bool) -> Result<()> {
   let limit = ctx.config.ledger_limit(limit);
   let entries = SettlementLedger::new(ctx.store.clone()).recent(limit)?;

   if json {
      let dtos: Vec<_> = entries.into_iter().map(LedgerEntryDto::from).collect();
      println!("{}", serde_json::to_string_pretty(&dtos)?);
      return Ok(());
   }

   if entries.is_empty() {
      println!("{}", style("Ledger is empty").dim());
      return Ok(());
   }

   for entry in &entries {
      println!(
         "  {:>6} {:<42} {:>22} {}",
         style(entry.id).dim(),
         entry.account_id,
         entry.amount.to_string(),
         style(format!(
            "{} {}",
            entry.item_id.as_deref().unwrap_or("-"),
            entry.created_at.to_rfc3339()
         ))
         .dim()
      );
   }
   Ok(())
}
