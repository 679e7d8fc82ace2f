//! Health check endpoint

use axum::{extract::State, Json};

use crate::dto::HealthResponse;
use crate::AppState;

/// GET /health - Check API health and engine state
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let executor = state.executor();
    Json(HealthResponse {
        can_sell: executor.gate().can_sell(),
        circulating_supply: executor.supply().await.circulating_supply(),
        ledger_entries: executor.ledger().await.len(),
        ..HealthResponse::default()
    })
}
