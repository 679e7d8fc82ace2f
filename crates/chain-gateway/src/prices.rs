//! Payment token USD prices
//!
//! A buy is priced in USD but paid in the route's token, so the engine needs
//! the token's USD price to know how many units to send.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use epo_core::{OracleError, TokenSymbol};

/// Source of USD prices for payment tokens
#[async_trait]
pub trait PaymentPriceSource: Send + Sync {
    /// USD value of one unit of `token`. Always finite and positive.
    async fn usd_price(&self, token: &TokenSymbol) -> Result<f64, OracleError>;
}

fn checked_price(token: &TokenSymbol, price: Option<f64>) -> Result<f64, OracleError> {
    match price {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p),
        Some(p) => Err(OracleError::InvalidValue { value: p }),
        None => Err(OracleError::PriceUnavailable {
            token: token.to_string(),
        }),
    }
}

/// Operator-maintained price table
#[derive(Debug, Default)]
pub struct StaticPriceTable {
    prices: RwLock<HashMap<TokenSymbol, f64>>,
}

impl StaticPriceTable {
    pub fn new(prices: &BTreeMap<String, f64>) -> Self {
        Self {
            prices: RwLock::new(
                prices
                    .iter()
                    .map(|(token, &price)| (TokenSymbol::new(token), price))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, token: &str, price: f64) {
        if let Ok(mut prices) = self.prices.write() {
            prices.insert(TokenSymbol::new(token), price);
        }
    }
}

#[async_trait]
impl PaymentPriceSource for StaticPriceTable {
    async fn usd_price(&self, token: &TokenSymbol) -> Result<f64, OracleError> {
        let price = self
            .prices
            .read()
            .map_err(|_| OracleError::Unavailable {
                message: "price table lock poisoned".into(),
            })?
            .get(&TokenSymbol::new(token.as_str()))
            .copied();
        checked_price(token, price)
    }
}

/// Reads a `{"ETH": 2450.1, "USDT": 1.0, ...}` document on every lookup
pub struct HttpPriceSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPriceSource {
    pub fn new(url: impl Into<String>) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .user_agent("epo-engine")
            .timeout(Duration::from_secs(12))
            .build()
            .map_err(|e| OracleError::Unavailable {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

fn lookup(prices: &HashMap<String, f64>, token: &TokenSymbol) -> Option<f64> {
    prices
        .iter()
        .find(|(symbol, _)| symbol.eq_ignore_ascii_case(token.as_str()))
        .map(|(_, &price)| price)
}

#[async_trait]
impl PaymentPriceSource for HttpPriceSource {
    async fn usd_price(&self, token: &TokenSymbol) -> Result<f64, OracleError> {
        let prices: HashMap<String, f64> = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OracleError::Unavailable {
                message: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| OracleError::Unavailable {
                message: format!("invalid price response: {}", e),
            })?;
        let price = lookup(&prices, token);
        tracing::debug!(token = %token, ?price, "Fetched payment token price");
        checked_price(token, price)
    }
}
