//! Treasury liquidity oracles

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use epo_core::OracleError;
use serde::Deserialize;

/// Source of the current treasury USD value
#[async_trait]
pub trait LiquidityOracle: Send + Sync {
    async fn current_liquidity_usd(&self) -> Result<f64, OracleError>;
}

fn checked(value: f64) -> Result<f64, OracleError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(OracleError::InvalidValue { value })
    }
}

/// Oracle document served by the treasury tracker
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiquiditySnapshot {
    total_usd_value: f64,
}

/// Reads `{"totalUsdValue": ...}` from an HTTP endpoint
pub struct HttpLiquidityOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpLiquidityOracle {
    pub fn new(url: impl Into<String>) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .user_agent("epo-engine")
            .timeout(Duration::from_secs(10))
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

#[async_trait]
impl LiquidityOracle for HttpLiquidityOracle {
    async fn current_liquidity_usd(&self) -> Result<f64, OracleError> {
        let snapshot: LiquiditySnapshot = self
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
                message: format!("invalid oracle response: {}", e),
            })?;
        checked(snapshot.total_usd_value)
    }
}

/// Oracle holding a value set by the operator (local runs, tests)
#[derive(Debug, Default)]
pub struct FixedLiquidityOracle {
    value: RwLock<f64>,
}

impl FixedLiquidityOracle {
    pub fn new(value: f64) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub fn set(&self, value: f64) {
        if let Ok(mut guard) = self.value.write() {
            *guard = value;
        }
    }
}

#[async_trait]
impl LiquidityOracle for FixedLiquidityOracle {
    async fn current_liquidity_usd(&self) -> Result<f64, OracleError> {
        let value = self.value.read().map(|v| *v).map_err(|_| OracleError::Unavailable {
            message: "oracle value lock poisoned".into(),
        })?;
        checked(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_oracle_reports_latest_value() {
        let oracle = FixedLiquidityOracle::new(250_000.0);
        assert_eq!(oracle.current_liquidity_usd().await.unwrap(), 250_000.0);

        oracle.set(1_000_000.0);
        assert_eq!(oracle.current_liquidity_usd().await.unwrap(), 1_000_000.0);
    }

    #[tokio::test]
    async fn test_fixed_oracle_rejects_invalid_values() {
        let oracle = FixedLiquidityOracle::new(-1.0);
        assert!(matches!(
            oracle.current_liquidity_usd().await,
            Err(OracleError::InvalidValue { .. })
        ));

        oracle.set(f64::NAN);
        assert!(oracle.current_liquidity_usd().await.is_err());
    }

    #[test]
    fn test_snapshot_parsing() {
        let snapshot: LiquiditySnapshot =
            serde_json::from_str(r#"{"totalUsdValue": 1234.5, "liquidityLockActive": true}"#)
                .unwrap();
        assert_eq!(snapshot.total_usd_value, 1234.5);
    }
}
