//! EPO State Types
//!
//! Owned supply state, quotes, liquidity status, and trade request/receipt types.

use epo_core::{Address, Direction, NetworkId, SaleError, TokenSymbol};
use ledger::Transaction;
use serde::{Deserialize, Serialize};

/// Token issuance counters. The only mutation paths are confirmed trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyState {
    total_supply: f64,
    circulating_supply: f64,
}

impl SupplyState {
    pub fn new(total_supply: f64, circulating_supply: f64) -> Result<Self, SaleError> {
        if !(total_supply > 0.0) {
            return Err(SaleError::InvalidAmount {
                message: format!("total supply must be positive, got {}", total_supply),
            });
        }
        if !(0.0..=total_supply).contains(&circulating_supply) {
            return Err(SaleError::InvalidAmount {
                message: format!(
                    "circulating supply {} outside [0, {}]",
                    circulating_supply, total_supply
                ),
            });
        }
        Ok(Self {
            total_supply,
            circulating_supply,
        })
    }

    pub fn total_supply(&self) -> f64 {
        self.total_supply
    }

    pub fn circulating_supply(&self) -> f64 {
        self.circulating_supply
    }

    pub fn remaining_supply(&self) -> f64 {
        self.total_supply - self.circulating_supply
    }

    pub fn is_exhausted(&self) -> bool {
        self.circulating_supply >= self.total_supply
    }

    /// Issue tokens for a confirmed buy. Returns the amount actually issued,
    /// which is short of `tokens` only when a concurrent buy took the tail of the supply.
    pub(crate) fn apply_buy(&mut self, tokens: f64) -> f64 {
        let issued = tokens.min(self.remaining_supply()).max(0.0);
        self.circulating_supply += issued;
        issued
    }

    /// Retire tokens for a confirmed sell. Returns the amount actually retired.
    pub(crate) fn apply_sell(&mut self, tokens: f64) -> f64 {
        let retired = tokens.min(self.circulating_supply).max(0.0);
        self.circulating_supply -= retired;
        retired
    }
}

/// Priced trade, computed against a supply snapshot. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub direction: Direction,
    /// Amount the caller asked to trade (USD for buys, tokens for sells)
    pub requested_amount: f64,
    /// Amount actually charged: equals `requested_amount` unless the buy is a partial fill
    pub input_amount: f64,
    /// Tokens for buys, USD for sells
    pub output_amount: f64,
    pub average_price: f64,
    pub price_impact_percent: f64,
    /// Informational; not netted from the transfer
    pub fee_amount: f64,
    pub start_price: f64,
    pub end_price: f64,
    /// Buy stopped at the supply cap before spending the full budget
    pub partial_fill: bool,
    pub unspent_usd: f64,
    /// Circulating supply the quote was priced against
    pub supply_snapshot: f64,
    /// Unix milliseconds
    pub quoted_at: u64,
}

impl Quote {
    /// A quote goes stale with age or as soon as supply moves
    pub fn is_stale(&self, now_ms: u64, window_ms: u64, circulating: f64) -> bool {
        now_ms.saturating_sub(self.quoted_at) > window_ms || self.supply_snapshot != circulating
    }
}

/// Bonding curve overview for display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveSnapshot {
    pub current_price: f64,
    pub next_price: f64,
    pub sell_price: f64,
    pub total_supply: f64,
    pub circulating_supply: f64,
    pub remaining_supply: f64,
    pub market_cap: f64,
    pub progress_percent: f64,
}

/// Sell gate state as last refreshed from the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityStatus {
    pub current_liquidity_usd: f64,
    pub threshold_usd: f64,
    pub can_sell: bool,
    pub progress_percent: f64,
    pub remaining_to_unlock_usd: f64,
    /// `None` once unlocked or while no inflow estimate exists
    pub estimated_days_to_unlock: Option<u64>,
    pub last_updated: Option<u64>,
    pub unlocked_at: Option<u64>,
}

/// Request to execute a trade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub account: Address,
    pub direction: Direction,
    pub network: NetworkId,
    pub token: TokenSymbol,
    /// USD for buys, tokens for sells
    pub amount: f64,
    /// Quote the user saw; re-priced when stale
    #[serde(default)]
    pub quote: Option<Quote>,
    /// Acknowledges a price impact above the warning level
    #[serde(default)]
    pub confirm_high_impact: bool,
}

/// Outcome of a completed trade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub transaction: Transaction,
    pub quote: Quote,
    /// The supplied quote was stale and the trade executed against a fresh one
    pub requoted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_state_bounds() {
        assert!(SupplyState::new(100.0, 0.0).is_ok());
        assert!(SupplyState::new(100.0, 100.0).is_ok());
        assert!(SupplyState::new(100.0, 101.0).is_err());
        assert!(SupplyState::new(100.0, -1.0).is_err());
        assert!(SupplyState::new(0.0, 0.0).is_err());
    }

    #[test]
    fn test_supply_mutation_keeps_invariant() {
        let mut supply = SupplyState::new(100.0, 90.0).unwrap();
        assert_eq!(supply.apply_buy(25.0), 10.0);
        assert!(supply.is_exhausted());
        assert_eq!(supply.apply_sell(150.0), 100.0);
        assert_eq!(supply.circulating_supply(), 0.0);
    }

    #[test]
    fn test_quote_staleness() {
        let quote = Quote {
            direction: Direction::Buy,
            requested_amount: 100.0,
            input_amount: 100.0,
            output_amount: 5000.0,
            average_price: 0.02,
            price_impact_percent: 0.0,
            fee_amount: 0.3,
            start_price: 0.02,
            end_price: 0.02,
            partial_fill: false,
            unspent_usd: 0.0,
            supply_snapshot: 0.0,
            quoted_at: 10_000,
        };
        assert!(!quote.is_stale(20_000, 15_000, 0.0));
        assert!(quote.is_stale(30_000, 15_000, 0.0));
        assert!(quote.is_stale(20_000, 15_000, 5000.0));
    }
}
