use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use marketcore::{
   Result,
   cmd::{self, Context},
};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the marketcore application
#[derive(Parser)]
#[command(name = "marketcore")]
#[command(about = "Deposit-address leasing and sale settlement")]
#[command(version)]
struct Cli {
   #[arg(long, global = true, help = "Extra config file merged over ~/.marketcore/config.toml")]
   config: Option<PathBuf>,

   #[arg(long, global = true, help = "Database path override")]
   db: Option<PathBuf>,

   #[command(subcommand)]
   command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
   #[command(about = "Run the HTTP API")]
   Serve {
      #[arg(long, help = "Listen address (default: config `bind`)")]
      bind: Option<String>,
   },

   #[command(about = "Manage the deposit-address pool")]
   Pool {
      #[command(subcommand)]
      action: PoolCmd,
   },

   #[command(about = "Manage catalog items")]
   Item {
      #[command(subcommand)]
      action: ItemCmd,
   },

   #[command(about = "Show recent ledger entries")]
   Ledger {
      #[arg(short = 'n', long, help = "Maximum entries (clamped to ledger_max_limit)")]
      limit: Option<usize>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },
}

#[derive(Subcommand)]
enum PoolCmd {
   #[command(about = "Add deposit addresses")]
   Add {
      #[arg(required = true, help = "0x-prefixed addresses")]
      addresses: Vec<String>,
   },

   #[command(about = "List addresses and their leases")]
   List {
      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "Activate or deactivate an address")]
   #[command(group(ArgGroup::new("state").required(true).args(["active", "inactive"])))]
   Toggle {
      address: String,

      #[arg(long)]
      active: bool,

      #[arg(long)]
      inactive: bool,
   },

   #[command(about = "Clear expired leases now")]
   Sweep,
}

#[derive(Subcommand)]
enum ItemCmd {
   #[command(about = "List a fixed-price item")]
   Add {
      #[arg(long)]
      id: String,

      #[arg(long)]
      owner: String,

      #[arg(long, help = "Asking price in ETH")]
      price_eth: f64,
   },
}

#[tokio::main]
async fn main() {
   let cli = Cli::parse();
   let default_level = if matches!(cli.command, Cmd::Serve { .. }) {
      Level::INFO
   } else {
      Level::WARN
   };
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
      .init();

   if let Err(err) = run(cli).await {
      eprintln!("{err}");
      std::process::exit(err.exit_code());
   }
}

async fn run(cli: Cli) -> Result<()> {
   let ctx = Context::open(cli.config.as_deref(), cli.db)?;

   match cli.command {
      Cmd::Serve { bind } => cmd::serve::execute(ctx, bind).await,
      Cmd::Pool { action } => match action {
         PoolCmd::Add { addresses } => cmd::pool::add(&ctx, &addresses),
         PoolCmd::List { json } => cmd::pool::list(&ctx, json),
         PoolCmd::Toggle { address, active, inactive } => {
            cmd::pool::toggle(&ctx, &address, active && !inactive)
         },
         PoolCmd::Sweep => cmd::pool::sweep(&ctx),
      },
      Cmd::Item { action } => match action {
         ItemCmd::Add { id, owner, price_eth } => cmd::item::add(&ctx, &id, &owner, price_eth),
      },
      Cmd::Ledger { limit, json } => cmd::ledger::execute(&ctx, limit, json),
   }
}
