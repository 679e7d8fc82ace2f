//! Data Transfer Objects for API requests and responses

use epo::Quote;
use epo_core::{Address, ChainId, NetworkId, TokenSymbol};
use ledger::Transaction;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub can_sell: bool,
    pub circulating_supply: f64,
    pub ledger_entries: usize,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            can_sell: false,
            circulating_supply: 0.0,
            ledger_entries: 0,
        }
    }
}

/// Buy quote request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyQuoteRequest {
    pub usd_amount: f64,
}

/// Sell quote request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellQuoteRequest {
    pub token_amount: f64,
}

/// Quote plus the execution hints the UI needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub quote: Quote,
    /// Price impact is above the warning level
    pub high_impact: bool,
    /// Relative precision of the token output
    pub max_error_bound: f64,
}

/// Treasury lookup response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryResponse {
    pub network: NetworkId,
    pub token: TokenSymbol,
    pub treasury_address: Address,
    pub chain_id: ChainId,
    pub chain_id_hex: String,
    pub chain_name: String,
}

/// Account history response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub account: String,
    pub transactions: Vec<Transaction>,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
