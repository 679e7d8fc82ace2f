//! Liquidity gate
//!
//! Selling stays locked until treasury liquidity first reaches the threshold.
//! Unlocking is one-way: later readings below the threshold never re-lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chain_gateway::LiquidityOracle;
use epo_core::{now_millis, LiquidityConfig, OracleError, SaleError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::state::LiquidityStatus;

#[derive(Debug, Default)]
struct GateState {
    current_liquidity_usd: f64,
    last_updated: Option<u64>,
    unlocked_at: Option<u64>,
}

/// Sell gate fed by a [`LiquidityOracle`]
pub struct LiquidityGate {
    oracle: Arc<dyn LiquidityOracle>,
    threshold_usd: f64,
    daily_inflow_usd: f64,
    state: RwLock<GateState>,
    refresh_lock: Mutex<()>,
    /// Bumped after every successful oracle read
    generation: AtomicU64,
}

impl LiquidityGate {
    pub fn new(oracle: Arc<dyn LiquidityOracle>, config: &LiquidityConfig) -> Self {
        Self {
            oracle,
            threshold_usd: config.threshold_usd,
            daily_inflow_usd: config.estimated_daily_inflow_usd,
            state: RwLock::new(GateState::default()),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn threshold_usd(&self) -> f64 {
        self.threshold_usd
    }

    /// Current gate view. Never calls the oracle.
    pub fn status(&self) -> LiquidityStatus {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let current = state.current_liquidity_usd;
        let can_sell = state.unlocked_at.is_some();

        let remaining = if can_sell {
            0.0
        } else {
            (self.threshold_usd - current).max(0.0)
        };
        let estimated_days_to_unlock = if can_sell || self.daily_inflow_usd <= 0.0 {
            None
        } else {
            Some((remaining / self.daily_inflow_usd).ceil() as u64)
        };

        LiquidityStatus {
            current_liquidity_usd: current,
            threshold_usd: self.threshold_usd,
            can_sell,
            progress_percent: (current / self.threshold_usd * 100.0).min(100.0),
            remaining_to_unlock_usd: remaining,
            estimated_days_to_unlock,
            last_updated: state.last_updated,
            unlocked_at: state.unlocked_at,
        }
    }

    pub fn can_sell(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unlocked_at
            .is_some()
    }

    /// Fails with [`SaleError::SellLocked`] while selling is locked
    pub fn check_sell(&self) -> Result<(), SaleError> {
        let status = self.status();
        if status.can_sell {
            Ok(())
        } else {
            Err(SaleError::SellLocked {
                current_usd: status.current_liquidity_usd,
                threshold_usd: status.threshold_usd,
                remaining_usd: status.remaining_to_unlock_usd,
            })
        }
    }

    /// Record an oracle reading and apply the unlock transition
    pub fn observe(&self, liquidity_usd: f64) {
        let now = now_millis();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.current_liquidity_usd = liquidity_usd;
        state.last_updated = Some(now);
        if state.unlocked_at.is_none() && liquidity_usd >= self.threshold_usd {
            state.unlocked_at = Some(now);
            tracing::info!(
                liquidity = liquidity_usd,
                threshold = self.threshold_usd,
                "Liquidity threshold reached, selling unlocked"
            );
        }
    }

    /// Restore a graduation that happened before a restart
    pub fn restore_unlocked(&self, unlocked_at: u64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.unlocked_at.is_none() {
            state.unlocked_at = Some(unlocked_at);
            tracing::info!(unlocked_at, "Restored unlocked liquidity gate");
        }
    }

    /// Read the oracle and update the gate.
    ///
    /// Callers arriving while a refresh is in flight wait for it and share its
    /// result instead of issuing a second oracle request. On oracle failure the
    /// previous status is kept.
    pub async fn refresh(&self) -> Result<LiquidityStatus, OracleError> {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        if self.generation.load(Ordering::Acquire) != seen {
            return Ok(self.status());
        }

        match self.oracle.current_liquidity_usd().await {
            Ok(value) => {
                self.observe(value);
                self.generation.fetch_add(1, Ordering::AcqRel);
                tracing::debug!(liquidity = value, "Liquidity refreshed");
                Ok(self.status())
            }
            Err(e) => {
                tracing::warn!("Liquidity refresh failed, keeping last status: {}", e);
                Err(e)
            }
        }
    }

    /// Refresh on a fixed cadence until the task is aborted
    pub fn spawn_refresh_loop(gate: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Failures are logged by refresh
                let _ = gate.refresh().await;
            }
        })
    }
}
