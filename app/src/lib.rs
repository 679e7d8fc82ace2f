//! EPO sale engine service
//!
//! Wires configuration, wallet gateway, liquidity oracle, and ledger into a
//! trade executor, then serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chain_gateway::{
    ChainGateway, FixedLiquidityOracle, HttpLiquidityOracle, HttpPriceSource, LiquidityOracle,
    PaymentPriceSource, RpcChainGateway, StaticPriceTable,
};
use epo::{LiquidityGate, PaymentRouter, SupplyState, TradeExecutor};
use epo_api::AppState;
use epo_core::{AppConfig, Direction};
use ledger::{JsonlStore, TransactionLedger, TxStatus};

/// Wallet bridge endpoint used when none is configured
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8545";

/// Environment variable naming the config file
const CONFIG_ENV: &str = "EPO_CONFIG";

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("epo=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();
    Ok(())
}

fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => Ok(AppConfig::load(&path).with_context(|| format!("loading {}", path))?),
        Err(_) => {
            tracing::info!("{} not set, using built-in defaults", CONFIG_ENV);
            let config = AppConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Fail every entry a previous run left pending; its confirmation was never
/// observed. Entries whose transfer was already submitted keep the chain
/// reference so the operator can reconcile them.
pub fn recover_interrupted(ledger: &mut TransactionLedger) -> anyhow::Result<usize> {
    let pending: Vec<_> = ledger
        .all()
        .iter()
        .filter(|tx| tx.status == TxStatus::Pending)
        .map(|tx| (tx.id.clone(), tx.chain_tx_ref.clone()))
        .collect();
    for (id, reference) in &pending {
        let reason = match reference {
            Some(reference) => {
                tracing::warn!(
                    id = %id,
                    reference = %reference,
                    "Trade interrupted after submission, transfer needs reconciliation"
                );
                format!("interrupted before confirmation of transfer {}", reference)
            }
            None => {
                tracing::warn!(id = %id, "Failing trade interrupted before submission");
                "interrupted before submission".to_string()
            }
        };
        ledger.finalize(id, TxStatus::Failed, None, Some(reason))?;
    }
    Ok(pending.len())
}

/// Circulating supply implied by the config baseline plus settled trades
pub fn restore_supply(config: &AppConfig, ledger: &TransactionLedger) -> anyhow::Result<SupplyState> {
    let total = config.curve.total_supply;
    let circulating = (config.curve.initial_circulating + ledger.net_issued()).clamp(0.0, total);
    Ok(SupplyState::new(total, circulating)?)
}

/// Time of the first settled sell, which proves the gate had unlocked
pub fn first_settled_sell(ledger: &TransactionLedger) -> Option<u64> {
    ledger
        .all()
        .iter()
        .filter(|tx| tx.status == TxStatus::Completed && tx.direction == Direction::Sell)
        .map(|tx| tx.timestamp)
        .min()
}

/// Assemble the engine from config
pub fn build_executor(config: &AppConfig) -> anyhow::Result<Arc<TradeExecutor>> {
    let gateway_url = config.gateway_url.clone().unwrap_or_else(|| {
        tracing::warn!("No gatewayUrl configured, using {}", DEFAULT_GATEWAY_URL);
        DEFAULT_GATEWAY_URL.to_string()
    });
    let gateway: Arc<dyn ChainGateway> = Arc::new(RpcChainGateway::new(gateway_url)?);

    let oracle: Arc<dyn LiquidityOracle> = match &config.oracle_url {
        Some(url) => Arc::new(HttpLiquidityOracle::new(url.clone())?),
        None => {
            tracing::info!(
                liquidity = config.liquidity.initial_liquidity_usd,
                "No oracleUrl configured, using fixed liquidity"
            );
            Arc::new(FixedLiquidityOracle::new(config.liquidity.initial_liquidity_usd))
        }
    };

    let prices: Arc<dyn PaymentPriceSource> = match &config.price_url {
        Some(url) => Arc::new(HttpPriceSource::new(url.clone())?),
        None => {
            tracing::info!(
                tokens = config.payment_prices.len(),
                "No priceUrl configured, using configured payment prices"
            );
            Arc::new(StaticPriceTable::new(&config.payment_prices))
        }
    };

    let store = JsonlStore::open(&config.ledger_path)
        .with_context(|| format!("opening ledger {}", config.ledger_path))?;
    let mut ledger = TransactionLedger::open(Box::new(store))?;
    let recovered = recover_interrupted(&mut ledger)?;

    let supply = restore_supply(config, &ledger)?;
    let gate = Arc::new(LiquidityGate::new(oracle, &config.liquidity));
    if let Some(at) = first_settled_sell(&ledger) {
        gate.restore_unlocked(at);
    }

    tracing::info!(
        entries = ledger.len(),
        recovered,
        circulating = supply.circulating_supply(),
        "Ledger restored"
    );

    let router = Arc::new(PaymentRouter::new(&config.router, gateway.clone()));
    Ok(Arc::new(TradeExecutor::new(
        &config.curve,
        supply,
        gate,
        router,
        gateway,
        prices,
        ledger,
        config.execution.clone(),
    )))
}

/// Run the service until the server stops
pub async fn run() -> anyhow::Result<()> {
    init_tracing()?;
    tracing::info!("Starting EPO sale engine");

    let config = load_config()?;
    let executor = build_executor(&config)?;

    let refresh = LiquidityGate::spawn_refresh_loop(
        executor.gate().clone(),
        Duration::from_secs(config.liquidity.refresh_interval_secs),
    );

    let result = epo_api::start_server(AppState::new(config, executor)).await;
    refresh.abort();
    result.context("API server stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use epo_core::{Address, NetworkId, TokenSymbol, TxId};
    use ledger::Transaction;

    fn entry(id: &str, direction: Direction, input: f64, output: f64, status: TxStatus) -> Transaction {
        Transaction {
            id: TxId::new(id),
            account: Address::new("0x1111111111111111111111111111111111111111"),
            direction,
            network: NetworkId::new("ethereum"),
            token: TokenSymbol::new("USDT"),
            input_amount: input,
            output_amount: output,
            average_price: 0.02,
            price_impact_percent: 0.0,
            fee_amount: 0.0,
            transfer_amount: input,
            timestamp: 1_000 + id.len() as u64,
            status,
            chain_tx_ref: None,
            failure_reason: None,
        }
    }

    #[test]
    fn test_recover_interrupted_fails_pending() {
        let mut ledger = TransactionLedger::in_memory();
        ledger
            .append(entry("a", Direction::Buy, 100.0, 5000.0, TxStatus::Completed))
            .unwrap();
        ledger
            .append(entry("bb", Direction::Buy, 10.0, 500.0, TxStatus::Pending))
            .unwrap();

        ledger
            .append(entry("ccc", Direction::Buy, 10.0, 500.0, TxStatus::Pending))
            .unwrap();
        ledger
            .attach_reference(&TxId::new("ccc"), "0xbeef".to_string())
            .unwrap();

        assert_eq!(recover_interrupted(&mut ledger).unwrap(), 2);
        let tx = ledger.get(&TxId::new("bb")).unwrap();
        assert_eq!(tx.status, TxStatus::Failed);
        assert!(tx.chain_tx_ref.is_none());
        assert!(tx.failure_reason.is_some());

        let tx = ledger.get(&TxId::new("ccc")).unwrap();
        assert_eq!(tx.status, TxStatus::Failed);
        assert_eq!(tx.chain_tx_ref.as_deref(), Some("0xbeef"));
        assert!(tx.failure_reason.as_deref().unwrap().contains("0xbeef"));
        assert_eq!(recover_interrupted(&mut ledger).unwrap(), 0);
    }

    #[test]
    fn test_restore_supply_from_settled_trades() {
        let mut ledger = TransactionLedger::in_memory();
        ledger
            .append(entry("a", Direction::Buy, 100.0, 5000.0, TxStatus::Completed))
            .unwrap();
        ledger
            .append(entry("bb", Direction::Sell, 1000.0, 15.0, TxStatus::Completed))
            .unwrap();
        ledger
            .append(entry("ccc", Direction::Buy, 10.0, 500.0, TxStatus::Failed))
            .unwrap();

        let mut config = AppConfig::default();
        config.curve.initial_circulating = 250.0;
        let supply = restore_supply(&config, &ledger).unwrap();
        assert_eq!(supply.circulating_supply(), 4250.0);
        assert_eq!(first_settled_sell(&ledger), Some(1_002));
    }

    #[test]
    fn test_no_sell_means_no_restored_unlock() {
        let mut ledger = TransactionLedger::in_memory();
        ledger
            .append(entry("a", Direction::Buy, 100.0, 5000.0, TxStatus::Completed))
            .unwrap();
        assert_eq!(first_settled_sell(&ledger), None);
    }
}
