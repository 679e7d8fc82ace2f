//! Configuration types for the EPO sale engine

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Address, Error, NativeCurrency, NetworkId, NetworkParams, Result, TokenSymbol};

/// Bonding curve and fee constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveConfig {
    /// Fixed token cap
    pub total_supply: f64,
    /// Buy price at zero circulating supply (USD)
    pub buy_min_price: f64,
    /// Buy price at full circulating supply (USD)
    pub buy_max_price: f64,
    /// Constant sell price (USD)
    pub sell_fixed_price: f64,
    /// Fee rate applied to the USD side of a trade (0.003 = 0.3%)
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    /// Simulator increment in tokens. Smaller is more precise and slower.
    #[serde(default = "default_step_tokens")]
    pub step_tokens: f64,
    /// Circulating supply at startup (restored from the ledger when one exists)
    #[serde(default)]
    pub initial_circulating: f64,
}

fn default_fee_rate() -> f64 {
    0.003
}

fn default_step_tokens() -> f64 {
    1_000.0
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            total_supply: 100_000_000.0,
            buy_min_price: 0.02,
            buy_max_price: 0.04,
            sell_fixed_price: 0.015,
            fee_rate: default_fee_rate(),
            step_tokens: default_step_tokens(),
            initial_circulating: 0.0,
        }
    }
}

/// Liquidity gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityConfig {
    /// Treasury USD value that unlocks selling
    pub threshold_usd: f64,
    /// Background refresh cadence
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Expected daily liquidity inflow, used only for the unlock estimate
    #[serde(default = "default_daily_inflow")]
    pub estimated_daily_inflow_usd: f64,
    /// Value served by the fixed oracle when no oracle URL is configured
    #[serde(default)]
    pub initial_liquidity_usd: f64,
}

fn default_refresh_interval() -> u64 {
    5 * 60
}

fn default_daily_inflow() -> f64 {
    10_000.0
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            threshold_usd: 1_000_000.0,
            refresh_interval_secs: default_refresh_interval(),
            estimated_daily_inflow_usd: default_daily_inflow(),
            initial_liquidity_usd: 0.0,
        }
    }
}

/// Destination treasury for a (network, token) payment pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryRoute {
    pub network: NetworkId,
    pub token: TokenSymbol,
    pub treasury_address: Address,
}

impl TreasuryRoute {
    pub fn new(network: &str, token: &str, treasury_address: &str) -> Self {
        Self {
            network: NetworkId::new(network),
            token: TokenSymbol::new(token),
            treasury_address: Address::new(treasury_address),
        }
    }
}

/// Payment routing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Bound on each switch / add-network request
    #[serde(default = "default_switch_timeout")]
    pub switch_timeout_secs: u64,
    pub networks: Vec<NetworkParams>,
    pub treasuries: Vec<TreasuryRoute>,
}

fn default_switch_timeout() -> u64 {
    30
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            switch_timeout_secs: default_switch_timeout(),
            networks: default_networks(),
            treasuries: default_treasuries(),
        }
    }
}

/// What to do with a trade whose price impact exceeds the warning level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactPolicy {
    /// Execute regardless
    Allow,
    /// Execute only when the request carries an explicit confirmation
    RequireConfirmation,
    /// Reject outright
    Block,
}

/// Trade execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// Quotes older than this are recomputed before submission
    #[serde(default = "default_staleness")]
    pub quote_staleness_secs: u64,
    #[serde(default = "default_impact_policy")]
    pub impact_policy: ImpactPolicy,
    #[serde(default = "default_impact_warning")]
    pub impact_warning_percent: f64,
    /// Bound on waiting for the chain to confirm a submitted transfer
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

fn default_staleness() -> u64 {
    15
}

fn default_impact_policy() -> ImpactPolicy {
    ImpactPolicy::RequireConfirmation
}

fn default_impact_warning() -> f64 {
    5.0
}

fn default_confirmation_timeout() -> u64 {
    5 * 60
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            quote_staleness_secs: default_staleness(),
            impact_policy: default_impact_policy(),
            impact_warning_percent: default_impact_warning(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub curve: CurveConfig,

    #[serde(default)]
    pub liquidity: LiquidityConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Wallet bridge JSON-RPC endpoint
    #[serde(default)]
    pub gateway_url: Option<String>,

    /// Liquidity oracle endpoint; a fixed oracle is used when absent
    #[serde(default)]
    pub oracle_url: Option<String>,

    /// Payment token price endpoint; `payment_prices` is used when absent
    #[serde(default)]
    pub price_url: Option<String>,

    /// USD price per unit of each payment token. Tokens without a price
    /// cannot be used to buy.
    #[serde(default = "default_payment_prices")]
    pub payment_prices: BTreeMap<String, f64>,

    /// Transaction log file
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_ledger_path() -> String {
    "epo-ledger.jsonl".to_string()
}

fn default_api_port() -> u16 {
    19090
}

/// Stablecoins only; volatile tokens need a live price source or an explicit entry
fn default_payment_prices() -> BTreeMap<String, f64> {
    [("USDT".to_string(), 1.0), ("USDC".to_string(), 1.0)]
        .into_iter()
        .collect()
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            curve: CurveConfig::default(),
            liquidity: LiquidityConfig::default(),
            router: RouterConfig::default(),
            execution: ExecutionConfig::default(),
            gateway_url: None,
            oracle_url: None,
            price_url: None,
            payment_prices: default_payment_prices(),
            ledger_path: default_ledger_path(),
            api_port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: AppConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            routes = config.router.treasuries.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject configurations the engine cannot price or route with
    pub fn validate(&self) -> Result<()> {
        let c = &self.curve;
        if !positive(c.total_supply) {
            return Err(Error::Config("totalSupply must be positive".into()));
        }
        if !(positive(c.buy_min_price) && positive(c.buy_max_price) && positive(c.sell_fixed_price)) {
            return Err(Error::Config("prices must be positive".into()));
        }
        if c.buy_min_price > c.buy_max_price {
            return Err(Error::Config(
                "buyMinPrice must not exceed buyMaxPrice".into(),
            ));
        }
        if !positive(c.step_tokens) {
            return Err(Error::Config("stepTokens must be positive".into()));
        }
        if !(0.0..1.0).contains(&c.fee_rate) {
            return Err(Error::Config("feeRate must be in [0, 1)".into()));
        }
        if !(c.initial_circulating >= 0.0 && c.initial_circulating <= c.total_supply) {
            return Err(Error::Config(
                "initialCirculating must be within [0, totalSupply]".into(),
            ));
        }
        if !positive(self.liquidity.threshold_usd) {
            return Err(Error::Config("thresholdUsd must be positive".into()));
        }
        if let Some((token, _)) = self.payment_prices.iter().find(|(_, &p)| !positive(p)) {
            return Err(Error::Config(format!("payment price for {} must be positive", token)));
        }

        let networks: HashSet<&NetworkId> =
            self.router.networks.iter().map(|n| &n.network).collect();
        let mut seen = HashSet::new();
        for route in &self.router.treasuries {
            if !networks.contains(&route.network) {
                return Err(Error::Config(format!(
                    "treasury route references unknown network {}",
                    route.network
                )));
            }
            if !route.treasury_address.is_valid() || route.treasury_address.is_zero() {
                return Err(Error::Config(format!(
                    "invalid treasury address for {} on {}: {}",
                    route.token, route.network, route.treasury_address
                )));
            }
            if !seen.insert((route.network.clone(), route.token.clone())) {
                return Err(Error::Config(format!(
                    "duplicate treasury route for {} on {}",
                    route.token, route.network
                )));
            }
        }
        Ok(())
    }
}

fn network(
    id: &str,
    chain_id: u64,
    chain_name: &str,
    currency: (&str, &str),
    rpc: &str,
    explorer: &str,
) -> NetworkParams {
    NetworkParams {
        network: NetworkId::new(id),
        chain_id,
        chain_name: chain_name.to_string(),
        native_currency: NativeCurrency {
            name: currency.0.to_string(),
            symbol: currency.1.to_string(),
            decimals: 18,
        },
        rpc_urls: vec![rpc.to_string()],
        block_explorer_urls: vec![explorer.to_string()],
    }
}

/// Production payment networks
pub fn default_networks() -> Vec<NetworkParams> {
    vec![
        network(
            "ethereum",
            1,
            "Ethereum Mainnet",
            ("Ethereum", "ETH"),
            "https://ethereum-rpc.publicnode.com",
            "https://etherscan.io",
        ),
        network(
            "bsc",
            56,
            "BSC Mainnet",
            ("BNB", "BNB"),
            "https://bsc-rpc.publicnode.com",
            "https://bscscan.com",
        ),
        network(
            "polygon",
            137,
            "Polygon Mainnet",
            ("MATIC", "MATIC"),
            "https://polygon-bor-rpc.publicnode.com",
            "https://polygonscan.com",
        ),
        network(
            "brainark",
            424242,
            "BrainArk Network",
            ("BrainArk Native Coin", "BAK"),
            "https://rpc.brainark.online",
            "https://explorer.brainark.online",
        ),
    ]
}

/// Production treasury table
pub fn default_treasuries() -> Vec<TreasuryRoute> {
    vec![
        TreasuryRoute::new("ethereum", "ETH", "0xC91A5902da7321054cEdAeB49ce9A6a3835Fc417"),
        TreasuryRoute::new("ethereum", "USDT", "0xc9dE877a53f85BF51D76faed0C8c8842EFb35782"),
        TreasuryRoute::new("ethereum", "USDC", "0x3A9ca3d316F2032d3a21741cBea2e047fd3C1145"),
        TreasuryRoute::new("bsc", "BNB", "0x794F67aA174bD0A252BeCA0089490a58Cc695a05"),
        TreasuryRoute::new("bsc", "USDT", "0xC13527f3bBAaf4cd726d07a78da9C5b74876527F"),
        TreasuryRoute::new("bsc", "USDC", "0x21FCcbB9b9b7c620BCbA61B6668C30F64C22859c"),
        TreasuryRoute::new("polygon", "MATIC", "0x6351f025E2DDe967A1FAD29d0fF44C3620F4EED7"),
        TreasuryRoute::new("polygon", "USDT", "0xd413afAB39D24462ACE36CFE5D710Ce9B813c84B"),
        TreasuryRoute::new("polygon", "USDC", "0xE97BF18735a1AB4A1bA9DDF284D7798A5B0f8a84"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.curve.total_supply, 100_000_000.0);
        assert_eq!(config.curve.buy_min_price, 0.02);
        assert_eq!(config.curve.buy_max_price, 0.04);
        assert_eq!(config.curve.sell_fixed_price, 0.015);
        assert_eq!(config.liquidity.threshold_usd, 1_000_000.0);
        assert_eq!(config.router.switch_timeout_secs, 30);
        assert_eq!(config.api_port, 19090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.router.treasuries, config.router.treasuries);
        assert_eq!(parsed.execution.impact_policy, ImpactPolicy::RequireConfirmation);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "apiPort": 8080, "execution": { "impactPolicy": "block" } }"#)
                .unwrap();
        assert_eq!(parsed.api_port, 8080);
        assert_eq!(parsed.execution.impact_policy, ImpactPolicy::Block);
        assert_eq!(parsed.execution.quote_staleness_secs, 15);
        assert_eq!(parsed.curve.step_tokens, 1_000.0);
    }

    #[test]
    fn test_validate_rejects_inverted_curve() {
        let mut config = AppConfig::default();
        config.curve.buy_min_price = 0.05;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_route() {
        let mut config = AppConfig::default();
        config.router.treasuries.push(TreasuryRoute::new(
            "ethereum",
            "usdt",
            "0x1111111111111111111111111111111111111111",
        ));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_unknown_network_route() {
        let mut config = AppConfig::default();
        config.router.treasuries.push(TreasuryRoute::new(
            "solana",
            "USDT",
            "0x1111111111111111111111111111111111111111",
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut config = AppConfig::default();
        config.curve.total_supply = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.curve.buy_max_price = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.curve.step_tokens = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.curve.initial_circulating = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.payment_prices.insert("ETH".into(), f64::INFINITY);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_prices_cover_stablecoins_only() {
        let config = AppConfig::default();
        assert_eq!(config.payment_prices.get("USDT"), Some(&1.0));
        assert_eq!(config.payment_prices.get("USDC"), Some(&1.0));
        assert!(!config.payment_prices.contains_key("ETH"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/epo.json").unwrap_err();
        assert_eq!(err.error_code(), "config_error");
    }
}
