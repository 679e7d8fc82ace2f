//! Liquidity gate endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use epo::LiquidityStatus;

use crate::routes::{reject, Rejection};
use crate::AppState;

/// Create liquidity routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_status))
        .route("/refresh", post(refresh))
}

/// GET /liquidity - Last known gate status
pub async fn get_status(State(state): State<AppState>) -> Json<LiquidityStatus> {
    Json(state.executor().gate().status())
}

/// POST /liquidity/refresh - Re-read the oracle now
pub async fn refresh(State(state): State<AppState>) -> Result<Json<LiquidityStatus>, Rejection> {
    let status = state
        .executor()
        .gate()
        .refresh()
        .await
        .map_err(|e| reject(e.status_code(), e.error_code(), e))?;
    Ok(Json(status))
}
