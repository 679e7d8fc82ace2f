//! Ledger records and derived positions

use epo_core::{Address, Direction, NetworkId, TokenSymbol, TxId};
use serde::{Deserialize, Serialize};

/// Lifecycle of a recorded trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl TxStatus {
    /// Completed and failed entries never change again
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One executed (or attempted) trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TxId,
    pub account: Address,
    pub direction: Direction,
    pub network: NetworkId,
    pub token: TokenSymbol,
    /// USD spent on a buy, tokens given up on a sell
    pub input_amount: f64,
    /// Tokens received on a buy, USD proceeds on a sell
    pub output_amount: f64,
    pub average_price: f64,
    pub price_impact_percent: f64,
    pub fee_amount: f64,
    /// Amount sent on chain, in the transfer token: payment token units on a
    /// buy, sale tokens on a sell
    #[serde(default)]
    pub transfer_amount: f64,
    /// Unix milliseconds
    pub timestamp: u64,
    pub status: TxStatus,
    #[serde(default)]
    pub chain_tx_ref: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Per-account aggregate, always recomputed from the log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPosition {
    pub account: String,
    /// Σ buy.outputAmount − Σ sell.inputAmount
    pub net_token_holdings: f64,
    /// Σ sell.proceeds − Σ buy.cost
    pub net_usd_position: f64,
    pub total_tokens_bought: f64,
    pub total_tokens_sold: f64,
    pub total_usd_spent: f64,
    pub total_usd_received: f64,
    pub total_fees_paid: f64,
    /// Completed trades only
    pub trade_count: usize,
}

impl UserPosition {
    /// Fold an account's history. Pending and failed entries contribute nothing.
    pub fn fold<'a>(account: &str, history: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut position = UserPosition {
            account: account.to_string(),
            ..Default::default()
        };

        for tx in history {
            if tx.status != TxStatus::Completed {
                continue;
            }
            match tx.direction {
                Direction::Buy => {
                    position.total_tokens_bought += tx.output_amount;
                    position.total_usd_spent += tx.input_amount;
                }
                Direction::Sell => {
                    position.total_tokens_sold += tx.input_amount;
                    position.total_usd_received += tx.output_amount;
                }
            }
            position.total_fees_paid += tx.fee_amount;
            position.trade_count += 1;
        }

        position.net_token_holdings = position.total_tokens_bought - position.total_tokens_sold;
        position.net_usd_position = position.total_usd_received - position.total_usd_spent;
        position
    }
}
