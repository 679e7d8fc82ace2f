//! Trade execution and account endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use epo::{TradeReceipt, TradeRequest};
use epo_core::{Address, SaleError};
use ledger::UserPosition;

use crate::dto::TransactionsResponse;
use crate::routes::{reject, Rejection};
use crate::AppState;

/// Create trade routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trades", post(execute_trade))
        .route("/positions/:account", get(get_position))
        .route("/transactions/:account", get(get_transactions))
}

fn parse_account(raw: String) -> Result<Address, Rejection> {
    let account = Address::new(raw);
    if account.is_valid() {
        Ok(account)
    } else {
        let e = SaleError::InvalidAddress {
            address: account.to_string(),
        };
        Err(reject(e.status_code(), e.error_code(), e))
    }
}

/// POST /trades - Execute a trade through the wallet
pub async fn execute_trade(
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<TradeReceipt>, Rejection> {
    let receipt = state
        .executor()
        .execute(request)
        .await
        .map_err(|e| reject(e.status_code(), e.error_code(), e))?;
    Ok(Json(receipt))
}

/// GET /positions/:account - Aggregate position from the ledger
pub async fn get_position(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<UserPosition>, Rejection> {
    let account = parse_account(account)?;
    let ledger = state.executor().ledger().await;
    Ok(Json(ledger.position_for(&account)))
}

/// GET /transactions/:account - Trade history in append order
pub async fn get_transactions(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<TransactionsResponse>, Rejection> {
    let account = parse_account(account)?;
    let ledger = state.executor().ledger().await;
    let transactions = ledger
        .transactions_for(&account)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(TransactionsResponse {
        account: account.normalized(),
        transactions,
    }))
}
