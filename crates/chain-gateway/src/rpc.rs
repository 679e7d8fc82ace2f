//! JSON-RPC wallet bridge
//!
//! Speaks the EIP-1193 request vocabulary over HTTP to a bridge process that
//! owns the user's wallet. Provider error codes are mapped onto
//! [`GatewayError`] so callers can tell rejections from unknown networks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use epo_core::{Address, ChainId, GatewayError, NetworkParams, TokenSymbol};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ChainGateway, Result, TransferRef, TransferStatus};

/// EIP-1193: user rejected the request
pub const CODE_USER_REJECTED: i64 = 4001;
/// EIP-3326: chain has not been added to the wallet
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;
/// MetaMask: a request of the same type is already pending
pub const CODE_REQUEST_PENDING: i64 = -32002;
/// JSON-RPC server error, used by nodes for insufficient funds among others
pub const CODE_SERVER_ERROR: i64 = -32000;

/// Per-request HTTP timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How often a submitted transfer's receipt is polled
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Map a provider error code and message onto the gateway taxonomy
pub fn classify_rpc_error(code: i64, message: &str) -> GatewayError {
    match code {
        CODE_USER_REJECTED => GatewayError::UserRejected,
        CODE_UNRECOGNIZED_CHAIN => GatewayError::NetworkUnknown,
        CODE_REQUEST_PENDING => GatewayError::RequestPending,
        _ if message.to_ascii_lowercase().contains("insufficient") => {
            GatewayError::InsufficientBalance {
                message: message.to_string(),
            }
        }
        // Some wallets wrap 4902 inside a generic error with the chain hint in the message
        _ if message.contains("Unrecognized chain") => GatewayError::NetworkUnknown,
        _ => GatewayError::Rpc {
            code,
            message: message.to_string(),
        },
    }
}

/// Parse a `0x`-prefixed hex quantity
fn parse_quantity(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            u64::from_str_radix(digits, 16).ok()
        }
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Wallet bridge client
pub struct RpcChainGateway {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    poll_interval: Duration,
}

impl RpcChainGateway {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("epo-engine")
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
            poll_interval: RECEIPT_POLL_INTERVAL,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!(method, id, "wallet bridge request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout {
                        secs: HTTP_TIMEOUT.as_secs(),
                    }
                } else {
                    GatewayError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let parsed: RpcResponse = response.json().await.map_err(|e| GatewayError::Transport {
            message: format!("invalid JSON-RPC response: {}", e),
        })?;

        if let Some(err) = parsed.error {
            let mapped = classify_rpc_error(err.code, &err.message);
            tracing::warn!(method, code = err.code, "wallet bridge error: {}", mapped);
            return Err(mapped);
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainGateway for RpcChainGateway {
    async fn active_network(&self) -> Result<ChainId> {
        let value = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&value).ok_or_else(|| GatewayError::Rpc {
            code: 0,
            message: format!("unparseable chain id: {}", value),
        })
    }

    async fn request_network_switch(&self, chain_id: ChainId) -> Result<()> {
        self.call(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format!("0x{:x}", chain_id) }]),
        )
        .await
        .map(|_| ())
    }

    async fn request_add_network(&self, params: &NetworkParams) -> Result<()> {
        self.call(
            "wallet_addEthereumChain",
            json!([{
                "chainId": params.chain_id_hex(),
                "chainName": params.chain_name,
                "nativeCurrency": params.native_currency,
                "rpcUrls": params.rpc_urls,
                "blockExplorerUrls": params.block_explorer_urls,
            }]),
        )
        .await
        .map(|_| ())
    }

    async fn submit_transfer(
        &self,
        to: &Address,
        amount: f64,
        token: &TokenSymbol,
    ) -> Result<TransferRef> {
        let value = self
            .call(
                "epo_submitTransfer",
                json!([{
                    "to": to.as_str(),
                    "amount": amount.to_string(),
                    "token": token.as_str(),
                }]),
            )
            .await?;
        value
            .as_str()
            .map(TransferRef::new)
            .ok_or_else(|| GatewayError::Rpc {
                code: 0,
                message: format!("transfer returned no hash: {}", value),
            })
    }

    async fn await_confirmation(&self, transfer: &TransferRef) -> Result<TransferStatus> {
        loop {
            let receipt = self
                .call("eth_getTransactionReceipt", json!([transfer.as_str()]))
                .await?;
            if !receipt.is_null() {
                let status = receipt.get("status").and_then(parse_quantity);
                return Ok(match status {
                    Some(1) => TransferStatus::Confirmed,
                    _ => TransferStatus::Failed,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_provider_codes() {
        assert_eq!(classify_rpc_error(4001, "User rejected"), GatewayError::UserRejected);
        assert_eq!(
            classify_rpc_error(4902, "Unrecognized chain ID"),
            GatewayError::NetworkUnknown
        );
        assert_eq!(
            classify_rpc_error(-32002, "Request already pending"),
            GatewayError::RequestPending
        );
    }

    #[test]
    fn test_classify_insufficient_funds() {
        let err = classify_rpc_error(CODE_SERVER_ERROR, "insufficient funds for gas * price + value");
        assert!(matches!(err, GatewayError::InsufficientBalance { .. }));
        assert_eq!(err.error_code(), "insufficient_balance");
    }

    #[test]
    fn test_classify_wrapped_unknown_chain() {
        let err = classify_rpc_error(-32603, "Unrecognized chain ID \"0x67932\"");
        assert_eq!(err, GatewayError::NetworkUnknown);
    }

    #[test]
    fn test_classify_other() {
        let err = classify_rpc_error(-32601, "method not found");
        assert_eq!(
            err,
            GatewayError::Rpc {
                code: -32601,
                message: "method not found".into()
            }
        );
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x89")), Some(137));
        assert_eq!(parse_quantity(&json!("0x1")), Some(1));
        assert_eq!(parse_quantity(&json!(56)), Some(56));
        assert_eq!(parse_quantity(&json!(null)), None);
        assert_eq!(parse_quantity(&json!("0xzz")), None);
    }
}
