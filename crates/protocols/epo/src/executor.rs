//! Trade execution
//!
//! Drives one trade from quote to settled ledger entry:
//! quote, network check, re-quote if supply moved meanwhile, pending entry,
//! transfer, confirmation, final entry.
//! Circulating supply changes only here, and only after the chain confirms.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chain_gateway::{timed, ChainGateway, PaymentPriceSource, TransferRef, TransferStatus};
use epo_core::{
    now_millis, Address, CurveConfig, Direction, Error, ExecutionConfig, ImpactPolicy, Result,
    SaleError, TokenSymbol, TxId,
};
use ledger::{Transaction, TransactionLedger, TxStatus};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::calculator::TradeSimulator;
use crate::constants::{NEXT_PRICE_LOOKAHEAD_TOKENS, SALE_TOKEN_SYMBOL, SUBMIT_TIMEOUT_SECS};
use crate::liquidity::LiquidityGate;
use crate::router::PaymentRouter;
use crate::state::{CurveSnapshot, Quote, SupplyState, TradeReceipt, TradeRequest};

/// Marks an account busy until dropped
struct AccountClaim<'a> {
    in_flight: &'a StdMutex<HashSet<String>>,
    account: String,
}

impl Drop for AccountClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.account);
    }
}

pub struct TradeExecutor {
    simulator: TradeSimulator,
    supply: RwLock<SupplyState>,
    gate: Arc<LiquidityGate>,
    router: Arc<PaymentRouter>,
    gateway: Arc<dyn ChainGateway>,
    prices: Arc<dyn PaymentPriceSource>,
    ledger: Mutex<TransactionLedger>,
    settings: ExecutionConfig,
    in_flight: StdMutex<HashSet<String>>,
}

impl TradeExecutor {
    pub fn new(
        curve: &CurveConfig,
        supply: SupplyState,
        gate: Arc<LiquidityGate>,
        router: Arc<PaymentRouter>,
        gateway: Arc<dyn ChainGateway>,
        prices: Arc<dyn PaymentPriceSource>,
        ledger: TransactionLedger,
        settings: ExecutionConfig,
    ) -> Self {
        Self {
            simulator: TradeSimulator::new(curve),
            supply: RwLock::new(supply),
            gate,
            router,
            gateway,
            prices,
            ledger: Mutex::new(ledger),
            settings,
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    pub fn simulator(&self) -> &TradeSimulator {
        &self.simulator
    }

    pub fn gate(&self) -> &Arc<LiquidityGate> {
        &self.gate
    }

    pub fn router(&self) -> &Arc<PaymentRouter> {
        &self.router
    }

    pub async fn ledger(&self) -> MutexGuard<'_, TransactionLedger> {
        self.ledger.lock().await
    }

    pub async fn supply(&self) -> SupplyState {
        *self.supply.read().await
    }

    pub async fn curve_snapshot(&self) -> CurveSnapshot {
        let supply = self.supply().await;
        self.simulator
            .curve()
            .snapshot(&supply, NEXT_PRICE_LOOKAHEAD_TOKENS)
    }

    /// Price a buy against current supply
    pub async fn quote_buy(&self, usd_amount: f64) -> std::result::Result<Quote, SaleError> {
        let circulating = self.supply().await.circulating_supply();
        self.simulator.quote_buy(usd_amount, circulating)
    }

    /// Price a sell against current supply and gate status
    pub async fn quote_sell(&self, token_amount: f64) -> std::result::Result<Quote, SaleError> {
        let circulating = self.supply().await.circulating_supply();
        self.price(Direction::Sell, token_amount, circulating)
    }

    fn price(
        &self,
        direction: Direction,
        amount: f64,
        circulating: f64,
    ) -> std::result::Result<Quote, SaleError> {
        match direction {
            Direction::Buy => self.simulator.quote_buy(amount, circulating),
            Direction::Sell => {
                if amount > circulating {
                    return Err(SaleError::InsufficientCirculating {
                        requested: amount,
                        circulating,
                    });
                }
                self.simulator
                    .quote_sell(amount, circulating, &self.gate.status())
            }
        }
    }

    fn claim(&self, account: &Address) -> std::result::Result<AccountClaim<'_>, SaleError> {
        let key = account.normalized();
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return Err(SaleError::TradePending { account: key });
        }
        Ok(AccountClaim {
            in_flight: &self.in_flight,
            account: key,
        })
    }

    /// Price the trade against supply as it is now. The caller's quote is
    /// never trusted; it only tells whether the user saw a different price.
    async fn fresh_quote(&self, request: &TradeRequest) -> std::result::Result<(Quote, bool), SaleError> {
        let circulating = self.supply().await.circulating_supply();
        let quote = self.price(request.direction, request.amount, circulating)?;

        let requoted = match &request.quote {
            None => false,
            Some(seen) => {
                let stale = seen.is_stale(now_millis(), self.staleness_window_ms(), circulating);
                let differs = seen.direction != quote.direction
                    || seen.input_amount != quote.input_amount
                    || seen.output_amount != quote.output_amount;
                stale || differs
            }
        };
        if requoted {
            tracing::info!(
                account = %request.account,
                output = quote.output_amount,
                "Quote was stale, executing against a fresh one"
            );
        }
        Ok((quote, requoted))
    }

    fn staleness_window_ms(&self) -> u64 {
        self.settings.quote_staleness_secs.saturating_mul(1000)
    }

    fn check_impact(&self, quote: &Quote, confirmed: bool) -> std::result::Result<(), SaleError> {
        let impact = quote.price_impact_percent;
        let limit = self.settings.impact_warning_percent;
        if impact <= limit {
            return Ok(());
        }
        match self.settings.impact_policy {
            ImpactPolicy::Allow => Ok(()),
            ImpactPolicy::RequireConfirmation if confirmed => Ok(()),
            ImpactPolicy::RequireConfirmation => Err(SaleError::ConfirmationRequired {
                impact_percent: impact,
            }),
            ImpactPolicy::Block => Err(SaleError::PriceImpactTooHigh {
                impact_percent: impact,
                limit_percent: limit,
            }),
        }
    }

    /// Record a failure. A ledger write error is logged; the trade's own
    /// error is what the caller reports.
    async fn mark_failed(&self, id: &TxId, reference: Option<&TransferRef>, error: &Error) {
        tracing::warn!(id = %id, "Trade failed: {}", error);
        let recorded = self
            .ledger
            .lock()
            .await
            .finalize(
                id,
                TxStatus::Failed,
                reference.map(|r| r.to_string()),
                Some(error.to_string()),
            )
            .map(|_| ());
        if let Err(e) = recorded {
            tracing::error!(id = %id, "Failed trade not persisted: {}", e);
        }
    }

    /// Execute a trade end to end.
    ///
    /// Nothing is recorded when the trade is rejected before the network
    /// check completes. Once a pending entry exists, every outcome finalizes it.
    pub async fn execute(&self, request: TradeRequest) -> Result<TradeReceipt> {
        if !(request.amount.is_finite() && request.amount > 0.0) {
            return Err(SaleError::InvalidAmount {
                message: format!("trade amount must be positive, got {}", request.amount),
            }
            .into());
        }
        if !request.account.is_valid() {
            return Err(SaleError::InvalidAddress {
                address: request.account.to_string(),
            }
            .into());
        }

        let _claim = self.claim(&request.account)?;
        if self.ledger.lock().await.has_pending(&request.account) {
            return Err(SaleError::TradePending {
                account: request.account.normalized(),
            }
            .into());
        }

        let route = self.router.resolve_treasury(&request.network, &request.token)?;
        if request.direction == Direction::Sell {
            self.gate.check_sell()?;
        }

        let (mut quote, mut requoted) = self.fresh_quote(&request).await?;
        self.check_impact(&quote, request.confirm_high_impact)?;

        // Buys are paid in the route's token; an unpriced token fails before the wallet is touched
        let payment_price = match request.direction {
            Direction::Buy => Some(self.prices.usd_price(&route.token).await?),
            Direction::Sell => None,
        };

        self.router.ensure_network(&route.network).await?;

        // The switch can outlast the staleness window or another trade can settle meanwhile
        let circulating = self.supply().await.circulating_supply();
        if quote.is_stale(now_millis(), self.staleness_window_ms(), circulating) {
            quote = self.price(request.direction, request.amount, circulating)?;
            self.check_impact(&quote, request.confirm_high_impact)?;
            requoted = true;
            tracing::info!(
                account = %request.account,
                circulating,
                output = quote.output_amount,
                "Supply moved during network check, repriced"
            );
        }

        let (transfer_token, transfer_amount) = match payment_price {
            Some(price) => (route.token.clone(), quote.input_amount / price),
            None => (TokenSymbol::new(SALE_TOKEN_SYMBOL), quote.input_amount),
        };

        let pending = Transaction {
            id: TxId::new(Uuid::new_v4().to_string()),
            account: request.account.clone(),
            direction: quote.direction,
            network: route.network.clone(),
            token: route.token.clone(),
            input_amount: quote.input_amount,
            output_amount: quote.output_amount,
            average_price: quote.average_price,
            price_impact_percent: quote.price_impact_percent,
            fee_amount: quote.fee_amount,
            transfer_amount,
            timestamp: now_millis(),
            status: TxStatus::Pending,
            chain_tx_ref: None,
            failure_reason: None,
        };
        let id = pending.id.clone();
        self.ledger.lock().await.append(pending)?;
        tracing::info!(
            id = %id,
            account = %request.account,
            direction = %quote.direction,
            network = %route.network,
            amount = transfer_amount,
            token = %transfer_token,
            "Trade pending"
        );

        let submitted = timed(
            Duration::from_secs(SUBMIT_TIMEOUT_SECS),
            self.gateway
                .submit_transfer(&route.treasury_address, transfer_amount, &transfer_token),
        )
        .await;
        let reference = match submitted {
            Ok(reference) => reference,
            Err(e) => {
                let error = Error::from(e);
                self.mark_failed(&id, None, &error).await;
                return Err(error);
            }
        };
        tracing::info!(id = %id, reference = %reference, "Transfer submitted");
        // Keeps the reference reconcilable if the process dies before confirmation
        if let Err(e) = self
            .ledger
            .lock()
            .await
            .attach_reference(&id, reference.to_string())
        {
            tracing::error!(
                id = %id,
                reference = %reference,
                "Transfer reference not persisted: {}",
                e
            );
        }

        let confirmation = timed(
            Duration::from_secs(self.settings.confirmation_timeout_secs),
            self.gateway.await_confirmation(&reference),
        )
        .await;
        match confirmation {
            Ok(TransferStatus::Confirmed) => {}
            Ok(TransferStatus::Failed) => {
                let error = Error::from(SaleError::TransferFailed {
                    reference: reference.to_string(),
                });
                self.mark_failed(&id, Some(&reference), &error).await;
                return Err(error);
            }
            Err(e) => {
                let error = Error::from(e);
                self.mark_failed(&id, Some(&reference), &error).await;
                return Err(error);
            }
        }

        // The chain has settled: supply moves even if the record cannot be written
        let transaction = {
            let mut ledger = self.ledger.lock().await;
            let finalized = ledger
                .finalize(&id, TxStatus::Completed, Some(reference.to_string()), None)
                .map(|tx| tx.clone());
            match finalized {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::error!(
                        id = %id,
                        reference = %reference,
                        "Confirmed trade not persisted: {}",
                        e
                    );
                    ledger.get(&id).cloned().ok_or(e)?
                }
            }
        };

        {
            let mut supply = self.supply.write().await;
            match quote.direction {
                Direction::Buy => {
                    let issued = supply.apply_buy(quote.output_amount);
                    if issued < quote.output_amount {
                        tracing::warn!(
                            id = %id,
                            quoted = quote.output_amount,
                            issued,
                            "Supply cap reached before the full buy could be issued"
                        );
                    }
                }
                Direction::Sell => {
                    supply.apply_sell(quote.input_amount);
                }
            }
            tracing::info!(
                id = %id,
                reference = %reference,
                circulating = supply.circulating_supply(),
                "Trade completed"
            );
        }

        Ok(TradeReceipt {
            transaction,
            quote,
            requoted,
        })
    }
}
