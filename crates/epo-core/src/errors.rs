//! Error types for the EPO sale engine

use thiserror::Error;

use crate::{ChainId, NetworkId, TokenSymbol, TxId};

/// Core errors that can occur in the sale engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("Sale error: {0}")]
    Sale(#[from] SaleError),

    #[error("Routing error: {0}")]
    Route(#[from] RouteError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Input and state errors raised by pricing and trade validation
#[derive(Debug, Error)]
pub enum SaleError {
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Supply exhausted: {circulating} of {total} tokens issued")]
    SupplyExhausted { circulating: f64, total: f64 },

    #[error("Cannot sell {requested} tokens, only {circulating} in circulation")]
    InsufficientCirculating { requested: f64, circulating: f64 },

    #[error(
        "Selling is locked until liquidity reaches ${threshold_usd:.0} (current ${current_usd:.0}, remaining ${remaining_usd:.0})"
    )]
    SellLocked {
        current_usd: f64,
        threshold_usd: f64,
        remaining_usd: f64,
    },

    #[error("Price impact {impact_percent:.2}% exceeds the {limit_percent:.2}% limit")]
    PriceImpactTooHigh {
        impact_percent: f64,
        limit_percent: f64,
    },

    #[error("Price impact {impact_percent:.2}% requires explicit confirmation")]
    ConfirmationRequired { impact_percent: f64 },

    #[error("A trade for {account} is still pending")]
    TradePending { account: String },

    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },

    #[error("Transfer failed on chain: {reference}")]
    TransferFailed { reference: String },
}

/// Payment routing and network-switch errors
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No treasury configured for {token} on {network}")]
    RouteNotConfigured {
        network: NetworkId,
        token: TokenSymbol,
    },

    #[error("Network not configured: {network}")]
    NetworkNotConfigured { network: NetworkId },

    #[error("A network switch is already in progress")]
    SwitchInProgress,

    #[error("Wallet reported chain {actual} after switching to {expected}")]
    SwitchNotConfirmed { expected: ChainId, actual: ChainId },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors reported by the chain gateway (wallet/provider)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("User rejected the request")]
    UserRejected,

    #[error("Network unknown to the wallet")]
    NetworkUnknown,

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Insufficient balance: {message}")]
    InsufficientBalance { message: String },

    #[error("A wallet request is already pending")]
    RequestPending,

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Gateway unreachable: {message}")]
    Transport { message: String },
}

/// Transaction ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transaction already recorded: {id}")]
    DuplicateId { id: TxId },

    #[error("Transaction not found: {id}")]
    NotFound { id: TxId },

    #[error("Transaction {id} is already final")]
    AlreadyFinal { id: TxId },

    #[error("Ledger storage failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt ledger record at line {line}: {message}")]
    Corrupt { line: usize, message: String },
}

/// Liquidity oracle errors
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Liquidity oracle unavailable: {message}")]
    Unavailable { message: String },

    #[error("Liquidity oracle returned an invalid value: {value}")]
    InvalidValue { value: f64 },

    #[error("No USD price available for {token}")]
    PriceUnavailable { token: String },
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl SaleError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::SupplyExhausted { .. } => "supply_exhausted",
            Self::InsufficientCirculating { .. } => "insufficient_circulating",
            Self::SellLocked { .. } => "sell_locked",
            Self::PriceImpactTooHigh { .. } => "price_impact_too_high",
            Self::ConfirmationRequired { .. } => "confirmation_required",
            Self::TradePending { .. } => "trade_pending",
            Self::InvalidAddress { .. } => "invalid_address",
            Self::TransferFailed { .. } => "transfer_failed",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount { .. } | Self::InvalidAddress { .. } => 400,
            Self::TradePending { .. } => 409,
            Self::TransferFailed { .. } => 502,
            Self::SupplyExhausted { .. }
            | Self::InsufficientCirculating { .. }
            | Self::SellLocked { .. }
            | Self::PriceImpactTooHigh { .. }
            | Self::ConfirmationRequired { .. } => 422,
        }
    }
}

impl GatewayError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UserRejected => "user_rejected",
            Self::NetworkUnknown => "network_unknown",
            Self::Timeout { .. } => "timeout",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::RequestPending => "request_pending",
            Self::Rpc { .. } => "rpc_error",
            Self::Transport { .. } => "gateway_unavailable",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::UserRejected => 409,
            Self::InsufficientBalance { .. } => 422,
            Self::RequestPending => 409,
            Self::Timeout { .. } => 504,
            Self::NetworkUnknown | Self::Rpc { .. } => 502,
            Self::Transport { .. } => 503,
        }
    }
}

impl RouteError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RouteNotConfigured { .. } => "route_not_configured",
            Self::NetworkNotConfigured { .. } => "network_not_configured",
            Self::SwitchInProgress => "switch_in_progress",
            Self::SwitchNotConfirmed { .. } => "switch_not_confirmed",
            Self::Gateway(e) => e.error_code(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::RouteNotConfigured { .. } | Self::NetworkNotConfigured { .. } => 404,
            Self::SwitchInProgress => 409,
            Self::SwitchNotConfirmed { .. } => 502,
            Self::Gateway(e) => e.status_code(),
        }
    }
}

impl LedgerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateId { .. } => "duplicate_transaction",
            Self::NotFound { .. } => "transaction_not_found",
            Self::AlreadyFinal { .. } => "transaction_final",
            Self::Io(_) => "ledger_io",
            Self::Corrupt { .. } => "ledger_corrupt",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::DuplicateId { .. } | Self::AlreadyFinal { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::Io(_) | Self::Corrupt { .. } => 500,
        }
    }
}

impl OracleError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "oracle_unavailable",
            Self::InvalidValue { .. } => "oracle_invalid_value",
            Self::PriceUnavailable { .. } => "price_unavailable",
        }
    }

    pub fn status_code(&self) -> u16 {
        503
    }
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Sale(e) => e.error_code(),
            Self::Route(e) => e.error_code(),
            Self::Gateway(e) => e.error_code(),
            Self::Ledger(e) => e.error_code(),
            Self::Oracle(e) => e.error_code(),
            Self::Config(_) => "config_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Sale(e) => e.status_code(),
            Self::Route(e) => e.status_code(),
            Self::Gateway(e) => e.status_code(),
            Self::Ledger(e) => e.status_code(),
            Self::Oracle(e) => e.status_code(),
            Self::Config(_) => 500,
        }
    }
}
