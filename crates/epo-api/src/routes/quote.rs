//! Curve and quote endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use epo::{CurveSnapshot, Quote};

use crate::dto::{BuyQuoteRequest, QuoteResponse, SellQuoteRequest};
use crate::routes::{reject, Rejection};
use crate::AppState;

/// Create curve and quote routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/curve", get(get_curve))
        .route("/quote/buy", post(quote_buy))
        .route("/quote/sell", post(quote_sell))
}

fn respond(state: &AppState, quote: Quote) -> Json<QuoteResponse> {
    let high_impact =
        quote.price_impact_percent > state.config().execution.impact_warning_percent;
    Json(QuoteResponse {
        quote,
        high_impact,
        max_error_bound: state.executor().simulator().max_error_bound(),
    })
}

/// GET /curve - Current price, next price, and supply
pub async fn get_curve(State(state): State<AppState>) -> Json<CurveSnapshot> {
    Json(state.executor().curve_snapshot().await)
}

/// POST /quote/buy - Price spending a USD amount
pub async fn quote_buy(
    State(state): State<AppState>,
    Json(request): Json<BuyQuoteRequest>,
) -> Result<Json<QuoteResponse>, Rejection> {
    let quote = state
        .executor()
        .quote_buy(request.usd_amount)
        .await
        .map_err(|e| reject(e.status_code(), e.error_code(), e))?;
    Ok(respond(&state, quote))
}

/// POST /quote/sell - Price selling a token amount
pub async fn quote_sell(
    State(state): State<AppState>,
    Json(request): Json<SellQuoteRequest>,
) -> Result<Json<QuoteResponse>, Rejection> {
    let quote = state
        .executor()
        .quote_sell(request.token_amount)
        .await
        .map_err(|e| reject(e.status_code(), e.error_code(), e))?;
    Ok(respond(&state, quote))
}
