//! EPO Constants
//!
//! Engine defaults that are not part of the deployment config.

/// Token lookahead used for the "next price" display
pub const NEXT_PRICE_LOOKAHEAD_TOKENS: f64 = 1_000.0;

/// Bound on submitting a transfer through the wallet (user approval included)
pub const SUBMIT_TIMEOUT_SECS: u64 = 120;

/// Token the user gives up on a sell
pub const SALE_TOKEN_SYMBOL: &str = "EPO";
