//! HTTP server command.
//!
//! Binds the API router, optionally runs the lease janitor, and shuts both
//! down on Ctrl-C.

use std::sync::Arc;

use console::style;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;

use crate::{
   Result,
   api::{self, AppState},
   auth::StaticTokenGate,
   cmd::Context,
   error::Error,
   lease::{self, AddressLeasePool},
   ledger::SettlementLedger,
};

/// Serves the API until interrupted.
pub async fn execute(ctx: Context, bind: Option<String>) -> Result<()> {
   let Context { config, store } = ctx;
   let settings = Arc::new(config.settings()?);
   let bind = bind.unwrap_or_else(|| config.bind.clone());

   let gate = StaticTokenGate::new(&config.tokens);
   if gate.is_empty() {
      tracing::warn!("no bearer tokens configured; every request will be rejected");
   }

   let pool = AddressLeasePool::new(store.clone());
   let state = AppState {
      pool:     pool.clone(),
      ledger:   SettlementLedger::new(store.clone()),
      auth:     Arc::new(gate),
      settings: Arc::clone(&settings),
      config:   Arc::new(config.clone()),
   };

   let listener = TcpListener::bind(&bind)
      .await
      .map_err(|e| Error::Server { op: "bind", reason: format!("{bind}: {e}") })?;
   let local = listener.local_addr()?;

   let shutdown = CancellationToken::new();
   let janitor = config
      .sweep_interval()
      .map(|interval| lease::spawn_janitor(pool, interval, shutdown.clone()));

   tracing::info!(
      addr = %local,
      db = %store.path().display(),
      commission_bps = settings.commission.bps(),
      lease_ttl_secs = settings.lease_ttl.as_secs(),
      janitor = janitor.is_some(),
      "marketcore listening"
   );
   println!("{} {}", style("Listening on").green().bold(), style(format!("http://{local}")).cyan());

   let token = shutdown.clone();
   let served = axum::serve(listener, api::router(state))
      .with_graceful_shutdown(async move {
         tokio::select! {
            _ = signal::ctrl_c() => {},
            () = token.cancelled() => {},
         }
      })
      .await;

   shutdown.cancel();
   if let Some(janitor) = janitor {
      let _ = janitor.await;
   }
   println!("{}", style("Server stopped").dim());

   served.map_err(|e| Error::Server { op: "serve", reason: e.to_string() })
}
