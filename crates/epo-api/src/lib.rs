//! epo-api: HTTP API layer for the EPO sale engine
//!
//! Exposes quotes, liquidity status, treasury lookup, trade execution, and
//! positions to the frontend.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::AppState;
