//! HTTP surface: lease, purchase and admin endpoints.
//!
//! Handlers resolve the caller, hand the blocking store work to
//! `spawn_blocking`, and map [`Error`] onto status codes.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
   Json, Router,
   extract::{
      FromRequestParts, Path, Query, State,
      rejection::{JsonRejection, QueryRejection},
   },
   http::{StatusCode, header::AUTHORIZATION, request::Parts},
   response::{IntoResponse, Response},
   routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
   Result,
   auth::{AuthGate, bearer_token},
   config::{Config, MarketSettings},
   error::Error,
   lease::AddressLeasePool,
   ledger::SettlementLedger,
   types::{
      Amount, Identity, Lease, LedgerEntry, PoolEntry, SaleRequest, normalize_address,
      same_account,
   },
};

/// Shared handler state. The settings snapshot is fixed for the life of the
/// process and passed by reference into every core call.
#[derive(Clone)]
pub struct AppState {
   pub pool:     AddressLeasePool,
   pub ledger:   SettlementLedger,
   pub auth:     Arc<dyn AuthGate>,
   pub settings: Arc<MarketSettings>,
   pub config:   Arc<Config>,
}

pub fn router(state: AppState) -> Router {
   Router::new()
      .route("/health", get(health))
      .route("/api/deposit/assign", post(assign))
      .route("/api/deposit/:address/release", post(release))
      .route("/api/nfts/purchase", post(purchase))
      .route("/api/admin/ledger", get(admin_ledger))
      .route("/api/admin/deposit-pool", get(admin_pool))
      .route("/api/admin/deposit-pool/toggle", post(admin_toggle))
      .route("/api/admin/site-settings", get(admin_settings))
      .layer(
         ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
      )
      .with_state(state)
}

/// Any caller with a resolvable bearer token.
pub struct Caller(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
   type Rejection = Error;

   async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
      let token = parts
         .headers
         .get(AUTHORIZATION)
         .and_then(|v| v.to_str().ok())
         .and_then(bearer_token)
         .ok_or(Error::Unauthorized)?;
      state
         .auth
         .resolve(token)
         .map(Self)
         .ok_or(Error::Unauthorized)
   }
}

/// A caller holding [`Role::Admin`](crate::types::Role::Admin).
pub struct Admin(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
   type Rejection = Error;

   async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
      let Caller(identity) = Caller::from_request_parts(parts, state).await?;
      if !identity.is_admin() {
         return Err(Error::Forbidden("admin role required"));
      }
      Ok(Self(identity))
   }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
   T: Send + 'static,
   F: FnOnce() -> Result<T> + Send + 'static,
{
   tokio::task::spawn_blocking(f).await?
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Success {
   pub success: bool,
}

const SUCCESS: Success = Success { success: true };

async fn health() -> Json<serde_json::Value> {
   Json(serde_json::json!({ "ok": true }))
}

async fn assign(State(state): State<AppState>, Caller(identity): Caller) -> Result<Json<Lease>> {
   let pool = state.pool.clone();
   let ttl = state.settings.lease_ttl;
   let lease = blocking(move || pool.acquire_lease(&identity.id, ttl, Utc::now())).await?;
   Ok(Json(lease))
}

async fn release(
   State(state): State<AppState>,
   Path(address): Path<String>,
) -> Result<Json<Success>> {
   let pool = state.pool.clone();
   blocking(move || pool.release_lease(&address)).await?;
   Ok(Json(SUCCESS))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBody {
   pub item_id:       Option<String>,
   pub buyer_address: Option<String>,
   pub price_eth:     Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
   pub success:        bool,
   pub commission_eth: f64,
}

async fn purchase(
   State(state): State<AppState>,
   Caller(identity): Caller,
   body: std::result::Result<Json<PurchaseBody>, JsonRejection>,
) -> Result<Json<PurchaseResponse>> {
   let Json(body) = body.map_err(|rejection| Error::validation(rejection.body_text()))?;
   let item_id = body
      .item_id
      .filter(|id| !id.trim().is_empty())
      .ok_or_else(|| Error::validation("itemId is required"))?;
   let buyer = body
      .buyer_address
      .ok_or_else(|| Error::validation("buyerAddress is required"))
      .and_then(|raw| normalize_address(&raw))?;
   let price_quote = body
      .price_eth
      .ok_or_else(|| Error::validation("priceEth is required"))
      .and_then(Amount::from_eth)?;

   if !same_account(&buyer, &identity.id) {
      tracing::warn!(caller = %identity.id, buyer = %buyer, "purchase for another account");
      return Err(Error::Forbidden("buyerAddress must be the caller's own account"));
   }

   tracing::debug!(caller = %identity.id, item_id = %item_id, "purchase requested");
   let request = SaleRequest { item_id, buyer, price_quote };
   let ledger = state.ledger.clone();
   let settings = Arc::clone(&state.settings);
   let receipt = blocking(move || ledger.settle_sale(&request, &settings, Utc::now())).await?;
   Ok(Json(PurchaseResponse { success: true, commission_eth: receipt.commission.as_eth() }))
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
   pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryDto {
   pub id:         i64,
   pub account_id: String,
   pub amount_eth: f64,
   pub nft_id:     Option<String>,
   pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryDto {
   fn from(entry: LedgerEntry) -> Self {
      Self {
         id:         entry.id,
         account_id: entry.account_id,
         amount_eth: entry.amount.as_eth(),
         nft_id:     entry.item_id,
         created_at: entry.created_at,
      }
   }
}

async fn admin_ledger(
   State(state): State<AppState>,
   Admin(_admin): Admin,
   query: std::result::Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<Json<Vec<LedgerEntryDto>>> {
   let Query(query) = query.map_err(|rejection| Error::validation(rejection.body_text()))?;
   let limit = state.config.ledger_limit(query.limit);
   let ledger = state.ledger.clone();
   let entries = blocking(move || ledger.recent(limit)).await?;
   Ok(Json(entries.into_iter().map(LedgerEntryDto::from).collect()))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntryDto {
   pub address:        String,
   pub assigned_to:    Option<String>,
   pub assigned_until: Option<DateTime<Utc>>,
   pub is_active:      bool,
}

impl PoolEntryDto {
   /// Lapsed leases are reported as unassigned.
   pub fn from_entry(entry: PoolEntry, now: DateTime<Utc>) -> Self {
      let live = entry.live_holder(now).is_some();
      Self {
         address:        entry.address,
         assigned_to:    entry.leased_to.filter(|_| live),
         assigned_until: entry.lease_expires_at.filter(|_| live),
         is_active:      entry.active,
      }
   }
}

async fn admin_pool(
   State(state): State<AppState>,
   Admin(_admin): Admin,
) -> Result<Json<Vec<PoolEntryDto>>> {
   let pool = state.pool.clone();
   let entries = blocking(move || pool.list()).await?;
   let now = Utc::now();
   Ok(Json(entries.into_iter().map(|e| PoolEntryDto::from_entry(e, now)).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBody {
   pub address:   String,
   pub is_active: bool,
}

async fn admin_toggle(
   State(state): State<AppState>,
   Admin(admin): Admin,
   body: std::result::Result<Json<ToggleBody>, JsonRejection>,
) -> Result<Json<Success>> {
   let Json(body) = body.map_err(|rejection| Error::validation(rejection.body_text()))?;
   tracing::info!(
      admin = %admin.id,
      address = %body.address,
      active = body.is_active,
      "toggle requested"
   );
   let pool = state.pool.clone();
   blocking(move || pool.set_active(&body.address, body.is_active)).await?;
   Ok(Json(SUCCESS))
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettingsDto {
   pub commission_percent:  f64,
   pub platform_account_id: String,
   pub lease_ttl_secs:      u64,
}

async fn admin_settings(
   State(state): State<AppState>,
   Admin(_admin): Admin,
) -> Json<SiteSettingsDto> {
   let settings = &state.settings;
   Json(SiteSettingsDto {
      commission_percent:  settings.commission.percent(),
      platform_account_id: settings.platform_account_id.clone(),
      lease_ttl_secs:      settings.lease_ttl.as_secs(),
   })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
   pub error:   String,
   pub message: String,
}

impl Error {
   pub const fn status_code(&self) -> StatusCode {
      match self {
         Self::NoAddressAvailable
         | Self::ItemNotForSale(_)
         | Self::PriceMismatch { .. }
         | Self::Validation(_) => StatusCode::BAD_REQUEST,
         Self::Unauthorized => StatusCode::UNAUTHORIZED,
         Self::Forbidden(_) => StatusCode::FORBIDDEN,
         Self::ItemNotFound(_) | Self::UnknownAddress(_) => StatusCode::NOT_FOUND,
         _ => StatusCode::INTERNAL_SERVER_ERROR,
      }
   }
}

impl IntoResponse for Error {
   fn into_response(self) -> Response {
      let status = self.status_code();
      // Store and internal details stay in the log.
      let message = if status.is_server_error() {
         tracing::error!(kind = self.kind(), "request failed: {self}");
         "internal server error".to_string()
      } else {
         self.to_string()
      };
      let body = ErrorBody { error: self.kind().to_string(), message };
      (status, Json(body)).into_response()
   }
}
