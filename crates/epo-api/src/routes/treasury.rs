//! Treasury routing endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use epo_core::{NetworkId, TokenSymbol, TreasuryRoute};

use crate::dto::TreasuryResponse;
use crate::routes::{reject, Rejection};
use crate::AppState;

/// Create treasury routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/treasury/:network/:token", get(get_treasury))
        .route("/routes", get(list_routes))
}

/// GET /treasury/:network/:token - Treasury for a payment pair
pub async fn get_treasury(
    State(state): State<AppState>,
    Path((network, token)): Path<(String, String)>,
) -> Result<Json<TreasuryResponse>, Rejection> {
    let router = state.executor().router();
    let route = router
        .resolve_treasury(&NetworkId::new(network), &TokenSymbol::new(token))
        .map_err(|e| reject(e.status_code(), e.error_code(), e))?;
    let params = router
        .network_params(&route.network)
        .map_err(|e| reject(e.status_code(), e.error_code(), e))?;

    Ok(Json(TreasuryResponse {
        chain_id: params.chain_id,
        chain_id_hex: params.chain_id_hex(),
        chain_name: params.chain_name.clone(),
        network: route.network,
        token: route.token,
        treasury_address: route.treasury_address,
    }))
}

/// GET /routes - Every configured payment route
pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<TreasuryRoute>> {
    Json(state.executor().router().routes())
}
