//! API route handlers

pub mod health;
pub mod liquidity;
pub mod quote;
pub mod trades;
pub mod treasury;

use axum::{http::StatusCode, routing::get, Json, Router};

use crate::dto::ApiError;
use crate::AppState;

/// Handler error: HTTP status plus JSON body
pub type Rejection = (StatusCode, Json<ApiError>);

/// Map an engine error onto its HTTP status and stable code
pub(crate) fn reject(status: u16, code: &str, message: impl ToString) -> Rejection {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ApiError::new(code, message.to_string())),
    )
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(quote::router())
        .merge(treasury::router())
        .merge(trades::router())
        .nest("/liquidity", liquidity::router())
        .with_state(state)
}
