//! chain-gateway: Interfaces to the wallet/chain provider and the liquidity oracle
//!
//! The sale engine never signs or broadcasts anything itself. It reads and
//! switches the wallet's active network, asks the wallet to send value to a
//! treasury, and waits for the chain to confirm it, all through [`ChainGateway`].
//! Treasury liquidity comes from a [`LiquidityOracle`], payment token prices
//! from a [`PaymentPriceSource`].

pub mod oracle;
pub mod prices;
pub mod rpc;

use std::time::Duration;

use async_trait::async_trait;
use epo_core::{Address, ChainId, GatewayError, NetworkParams, TokenSymbol};
use serde::{Deserialize, Serialize};

pub use oracle::{FixedLiquidityOracle, HttpLiquidityOracle, LiquidityOracle};
pub use prices::{HttpPriceSource, PaymentPriceSource, StaticPriceTable};
pub use rpc::RpcChainGateway;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Chain reference of a submitted transfer (transaction hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferRef(pub String);

impl TransferRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransferRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final on-chain outcome of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Confirmed,
    Failed,
}

/// Wallet/provider operations the engine depends on
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Chain id the wallet is currently connected to
    async fn active_network(&self) -> Result<ChainId>;

    /// Ask the wallet to switch to `chain_id`.
    /// Fails with [`GatewayError::NetworkUnknown`] when the wallet has never seen it.
    async fn request_network_switch(&self, chain_id: ChainId) -> Result<()>;

    /// Ask the wallet to register a network it does not know yet
    async fn request_add_network(&self, params: &NetworkParams) -> Result<()>;

    /// Send `amount` of `token` to `to`, returning the chain reference
    async fn submit_transfer(
        &self,
        to: &Address,
        amount: f64,
        token: &TokenSymbol,
    ) -> Result<TransferRef>;

    /// Wait until the chain reports a final status for `transfer`
    async fn await_confirmation(&self, transfer: &TransferRef) -> Result<TransferStatus>;
}

/// Race a gateway call against `limit`. A lapse becomes [`GatewayError::Timeout`].
pub async fn timed<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| GatewayError::Timeout {
            secs: limit.as_secs(),
        })?
}
