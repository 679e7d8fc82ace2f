//! EPO Token Sale Implementation
//!
//! Tokens are bought along a linear bonding curve and sold back at a fixed
//! floor price. Selling opens only after treasury liquidity first crosses a
//! threshold. Payments go to a treasury chosen by (network, payment token), and
//! every executed trade is recorded in the transaction ledger.

pub mod calculator;
pub mod constants;
pub mod executor;
pub mod liquidity;
pub mod router;
pub mod state;

#[cfg(test)]
mod testing;

// Re-exports
pub use calculator::{PriceCurve, TradeSimulator};
pub use constants::{NEXT_PRICE_LOOKAHEAD_TOKENS, SALE_TOKEN_SYMBOL};
pub use executor::TradeExecutor;
pub use liquidity::LiquidityGate;
pub use router::PaymentRouter;
pub use state::{CurveSnapshot, LiquidityStatus, Quote, SupplyState, TradeReceipt, TradeRequest};
