// =============================================================================
// REST API — dashboard and copy-trading administration
// =============================================================================
//
// A thin axum surface over the registry. The core never depends on this
// module; everything here reads service state or forwards admin mutations.
// =============================================================================

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::discovery::{handle_launch_event, LaunchEvent};
use crate::persistence::rows::{PositionRow, TrackedWalletRow};
use crate::registry::Registry;
use crate::wallets::CopySettings;

/// Build the admin router.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/portfolio/paper", get(paper_portfolio))
        .route("/api/portfolio/real", get(real_portfolio))
        .route("/api/positions", get(positions))
        .route("/api/discovery/launch", post(inject_launch))
        .route("/api/copy/wallets", get(list_wallets).post(upsert_wallet))
        .route("/api/copy/wallets/:address", delete(remove_wallet))
        .route("/api/copy/event", post(inject_wallet_event))
        .route(
            "/api/copy/settings",
            get(copy_settings).put(set_copy_settings),
        )
        .route("/api/copy/stats", get(copy_stats))
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

async fn status(State(registry): State<Arc<Registry>>) -> Json<Value> {
    let queue_size = registry.queue.size().await;
    let config = registry.config.read().clone();
    Json(json!({
        "uptime_secs": registry.uptime_secs(),
        "trading_mode": config.trading_mode.to_string(),
        "queue_size": queue_size,
        "worker_count": config.worker_count,
        "real_trading_enabled": registry.real.is_some(),
        "copy_trading_enabled": registry.copy.is_some(),
        "circuit_breaker_tripped": registry
            .real
            .as_ref()
            .map(|r| r.circuit_tripped())
            .unwrap_or(false),
    }))
}

async fn paper_portfolio(
    State(registry): State<Arc<Registry>>,
) -> Result<Json<Value>, StatusCode> {
    let summary = registry
        .paper
        .portfolio_summary()
        .map_err(|e| internal(&e))?;
    Ok(Json(json!(summary)))
}

async fn real_portfolio(
    State(registry): State<Arc<Registry>>,
) -> Result<Json<Value>, StatusCode> {
    let Some(real) = &registry.real else {
        return Err(StatusCode::NOT_FOUND);
    };
    let summary = real.portfolio_summary().map_err(|e| internal(&e))?;
    Ok(Json(json!(summary)))
}

#[derive(Deserialize)]
struct PositionsQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    paper: Option<i64>,
}

async fn positions(
    State(registry): State<Arc<Registry>>,
    Query(query): Query<PositionsQuery>,
) -> Result<Json<Value>, StatusCode> {
    let status = query.status.as_deref().unwrap_or("open");
    let is_paper = query.paper.unwrap_or(1);
    let rows = registry
        .db
        .positions_with_status(status, is_paper)
        .map_err(|e| internal(&e))?;
    Ok(Json(json!(rows
        .iter()
        .map(position_json)
        .collect::<Vec<_>>())))
}

fn position_json(pos: &PositionRow) -> Value {
    json!({
        "id": pos.id,
        "token_address": pos.token_address,
        "symbol": pos.symbol,
        "entry_price": pos.entry_price.and_then(|d| d.to_f64()),
        "current_price": pos.current_price.and_then(|d| d.to_f64()),
        "amount_sol_invested": pos.amount_sol_invested.and_then(|d| d.to_f64()),
        "pnl_pct": pos.pnl_pct.to_f64(),
        "pnl_usd": pos.pnl_usd.to_f64(),
        "max_price": pos.max_price.and_then(|d| d.to_f64()),
        "status": pos.status,
        "close_reason": pos.close_reason,
        "is_paper": pos.is_paper == 1,
        "is_micro_entry": pos.is_micro_entry == 1,
        "source": pos.source,
        "copied_from_wallet": pos.copied_from_wallet,
        "opened_at": pos.opened_at.map(|t| t.to_rfc3339()),
        "closed_at": pos.closed_at.map(|t| t.to_rfc3339()),
    })
}

/// Intake endpoint for the external discovery subscriber.
async fn inject_launch(
    State(registry): State<Arc<Registry>>,
    Json(event): Json<LaunchEvent>,
) -> Result<Json<Value>, StatusCode> {
    let token_id = handle_launch_event(&registry.db, &registry.queue, &event)
        .await
        .map_err(|e| internal(&e))?;
    Ok(Json(json!({ "token_id": token_id })))
}

// --- Copy trading admin -----------------------------------------------------

async fn list_wallets(State(registry): State<Arc<Registry>>) -> Json<Value> {
    let snapshot = registry.wallets.snapshot();
    let mut wallets: Vec<&TrackedWalletRow> = snapshot.values().collect();
    wallets.sort_by(|a, b| a.label.cmp(&b.label));
    Json(json!(wallets))
}

async fn upsert_wallet(
    State(registry): State<Arc<Registry>>,
    Json(wallet): Json<TrackedWalletRow>,
) -> Result<Json<Value>, StatusCode> {
    registry
        .db
        .upsert_tracked_wallet(&wallet)
        .map_err(|e| internal(&e))?;
    registry.wallets.upsert(wallet.clone());
    Ok(Json(json!({ "ok": true, "address": wallet.address })))
}

async fn remove_wallet(
    State(registry): State<Arc<Registry>>,
    Path(address): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let existed = registry
        .db
        .delete_tracked_wallet(&address)
        .map_err(|e| internal(&e))?;
    registry.wallets.remove(&address);
    if !existed {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct WalletEventBody {
    wallet_address: String,
    signature: String,
}

/// Intake endpoint for the external wallet-event detector.
async fn inject_wallet_event(
    State(registry): State<Arc<Registry>>,
    Json(body): Json<WalletEventBody>,
) -> Result<Json<Value>, StatusCode> {
    let Some(copy) = &registry.copy else {
        return Err(StatusCode::NOT_FOUND);
    };
    copy.on_wallet_event(&body.wallet_address, &body.signature)
        .await
        .map_err(|e| internal(&e))?;
    Ok(Json(json!({ "ok": true })))
}

async fn copy_settings(State(registry): State<Arc<Registry>>) -> Json<CopySettings> {
    Json(registry.wallets.settings())
}

async fn set_copy_settings(
    State(registry): State<Arc<Registry>>,
    Json(settings): Json<CopySettings>,
) -> Json<Value> {
    registry.wallets.set_settings(settings);
    Json(json!({ "ok": true }))
}

async fn copy_stats(State(registry): State<Arc<Registry>>) -> Result<Json<Value>, StatusCode> {
    let Some(copy) = &registry.copy else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(json!(copy.stats())))
}

fn internal(e: &anyhow::Error) -> StatusCode {
    warn!(error = %e, "api: request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}
