//! EPO Calculator
//!
//! Pure pricing math. No async, no gateway.
//!
//! Buy price follows a linear bonding curve over circulating supply:
//!   price(s) = buy_min + (buy_max - buy_min) * s / total_supply
//!
//! Sell price is a fixed floor independent of supply.
//!
//! Buy quotes walk the curve in `step_tokens` increments, charging each step
//! at the price where it starts. This left Riemann sum slightly undercharges,
//! so the token output is overstated by at most
//!   (buy_max - buy_min) * step / (2 * total_supply * buy_min)
//! relative to the exact integral (5e-6 with the production constants).

use epo_core::{now_millis, CurveConfig, Direction, SaleError};

use crate::state::{CurveSnapshot, LiquidityStatus, Quote, SupplyState};

/// Linear buy curve plus fixed sell price
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCurve {
    total_supply: f64,
    buy_min_price: f64,
    buy_max_price: f64,
    sell_fixed_price: f64,
}

impl PriceCurve {
    pub fn new(config: &CurveConfig) -> Self {
        Self {
            total_supply: config.total_supply,
            buy_min_price: config.buy_min_price,
            buy_max_price: config.buy_max_price,
            sell_fixed_price: config.sell_fixed_price,
        }
    }

    pub fn total_supply(&self) -> f64 {
        self.total_supply
    }

    fn slope(&self) -> f64 {
        (self.buy_max_price - self.buy_min_price) / self.total_supply
    }

    /// Unit buy price at `circulating`. Supply outside [0, total] is clamped.
    pub fn buy_price(&self, circulating: f64) -> f64 {
        let s = circulating.clamp(0.0, self.total_supply);
        self.buy_min_price + (self.buy_max_price - self.buy_min_price) * (s / self.total_supply)
    }

    pub fn sell_price(&self) -> f64 {
        self.sell_fixed_price
    }

    /// Exact USD cost of the tokens between two supply points (integral of the curve)
    pub fn cost_between(&self, from: f64, to: f64) -> f64 {
        let a = from.clamp(0.0, self.total_supply);
        let b = to.clamp(0.0, self.total_supply);
        (b - a) * self.buy_min_price + self.slope() / 2.0 * (b * b - a * a)
    }

    /// Buy price after a further `lookahead` tokens are issued
    pub fn next_price(&self, circulating: f64, lookahead: f64) -> f64 {
        self.buy_price(circulating + lookahead)
    }

    pub fn snapshot(&self, supply: &SupplyState, lookahead: f64) -> CurveSnapshot {
        let circulating = supply.circulating_supply();
        let current_price = self.buy_price(circulating);
        CurveSnapshot {
            current_price,
            next_price: self.next_price(circulating, lookahead),
            sell_price: self.sell_price(),
            total_supply: supply.total_supply(),
            circulating_supply: circulating,
            remaining_supply: supply.remaining_supply(),
            market_cap: circulating * current_price,
            progress_percent: circulating / supply.total_supply() * 100.0,
        }
    }
}

/// Turns trade amounts into quotes
#[derive(Debug, Clone)]
pub struct TradeSimulator {
    curve: PriceCurve,
    fee_rate: f64,
    step_tokens: f64,
}

fn check_amount(amount: f64, what: &str) -> Result<(), SaleError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(SaleError::InvalidAmount {
            message: format!("{} must be positive, got {}", what, amount),
        })
    }
}

impl TradeSimulator {
    pub fn new(config: &CurveConfig) -> Self {
        Self {
            curve: PriceCurve::new(config),
            fee_rate: config.fee_rate,
            step_tokens: config.step_tokens,
        }
    }

    pub fn curve(&self) -> &PriceCurve {
        &self.curve
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    /// Upper bound on the relative overstatement of a buy quote's output
    pub fn max_error_bound(&self) -> f64 {
        (self.curve.buy_max_price - self.curve.buy_min_price) * self.step_tokens
            / (2.0 * self.curve.total_supply * self.curve.buy_min_price)
    }

    /// Quote spending `usd_amount` on the buy curve from `circulating`
    pub fn quote_buy(&self, usd_amount: f64, circulating: f64) -> Result<Quote, SaleError> {
        check_amount(usd_amount, "USD amount")?;
        let total = self.curve.total_supply;
        if circulating >= total {
            return Err(SaleError::SupplyExhausted {
                circulating,
                total,
            });
        }

        let start_price = self.curve.buy_price(circulating);
        let mut remaining_usd = usd_amount;
        let mut tokens = 0.0;
        let mut supply = circulating.max(0.0);

        while remaining_usd > 0.0 && supply < total {
            let price = self.curve.buy_price(supply);
            let step = self.step_tokens.min(total - supply);
            if step <= 0.0 {
                break;
            }
            let step_cost = step * price;

            if step_cost <= remaining_usd {
                tokens += step;
                remaining_usd -= step_cost;
                supply += step;
            } else {
                let partial = remaining_usd / price;
                tokens += partial;
                supply += partial;
                remaining_usd = 0.0;
            }
        }

        let end_price = self.curve.buy_price(supply);
        // Dust left by float subtraction is not a partial fill
        let partial_fill = supply >= total && remaining_usd > usd_amount * 1e-12;
        let unspent_usd = if partial_fill { remaining_usd } else { 0.0 };
        let input_amount = usd_amount - unspent_usd;
        let average_price = if tokens > 0.0 {
            input_amount / tokens
        } else {
            start_price
        };

        let quote = Quote {
            direction: Direction::Buy,
            requested_amount: usd_amount,
            input_amount,
            output_amount: tokens,
            average_price,
            price_impact_percent: (end_price - start_price) / start_price * 100.0,
            fee_amount: input_amount * self.fee_rate,
            start_price,
            end_price,
            partial_fill,
            unspent_usd,
            supply_snapshot: circulating,
            quoted_at: now_millis(),
        };

        tracing::debug!(
            usd = usd_amount,
            tokens = quote.output_amount,
            impact = quote.price_impact_percent,
            partial = partial_fill,
            "buy quote"
        );
        Ok(quote)
    }

    /// Quote selling `token_amount` at the fixed sell price.
    /// Re-checks the liquidity gate so a locked sell can never be priced.
    pub fn quote_sell(
        &self,
        token_amount: f64,
        circulating: f64,
        liquidity: &LiquidityStatus,
    ) -> Result<Quote, SaleError> {
        check_amount(token_amount, "token amount")?;
        if !liquidity.can_sell {
            return Err(SaleError::SellLocked {
                current_usd: liquidity.current_liquidity_usd,
                threshold_usd: liquidity.threshold_usd,
                remaining_usd: liquidity.remaining_to_unlock_usd,
            });
        }

        let price = self.curve.sell_price();
        let proceeds = token_amount * price;
        Ok(Quote {
            direction: Direction::Sell,
            requested_amount: token_amount,
            input_amount: token_amount,
            output_amount: proceeds,
            average_price: price,
            price_impact_percent: 0.0,
            fee_amount: proceeds * self.fee_rate,
            start_price: price,
            end_price: price,
            partial_fill: false,
            unspent_usd: 0.0,
            supply_snapshot: circulating,
            quoted_at: now_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CurveConfig {
        CurveConfig::default()
    }

    fn unlocked() -> LiquidityStatus {
        LiquidityStatus {
            current_liquidity_usd: 1_000_000.0,
            threshold_usd: 1_000_000.0,
            can_sell: true,
            progress_percent: 100.0,
            remaining_to_unlock_usd: 0.0,
            estimated_days_to_unlock: None,
            last_updated: Some(1),
            unlocked_at: Some(1),
        }
    }

    fn locked() -> LiquidityStatus {
        LiquidityStatus {
            current_liquidity_usd: 999_999.0,
            threshold_usd: 1_000_000.0,
            can_sell: false,
            progress_percent: 99.9999,
            remaining_to_unlock_usd: 1.0,
            estimated_days_to_unlock: Some(1),
            last_updated: Some(1),
            unlocked_at: None,
        }
    }

    /// Closed-form token output for spending `usd` from zero supply
    fn exact_tokens(curve_cfg: &CurveConfig, usd: f64) -> f64 {
        let k = (curve_cfg.buy_max_price - curve_cfg.buy_min_price) / curve_cfg.total_supply;
        let p0 = curve_cfg.buy_min_price;
        ((p0 * p0 + 2.0 * k * usd).sqrt() - p0) / k
    }

    #[test]
    fn test_buy_price_endpoints() {
        let curve = PriceCurve::new(&config());
        assert_eq!(curve.buy_price(0.0), 0.02);
        assert!((curve.buy_price(100_000_000.0) - 0.04).abs() < 1e-15);
        assert!((curve.buy_price(50_000_000.0) - 0.03).abs() < 1e-15);
    }

    #[test]
    fn test_buy_price_clamps_out_of_range_supply() {
        let curve = PriceCurve::new(&config());
        assert_eq!(curve.buy_price(-10.0), 0.02);
        assert_eq!(curve.buy_price(200_000_000.0), curve.buy_price(100_000_000.0));
    }

    #[test]
    fn test_buy_price_non_decreasing() {
        let curve = PriceCurve::new(&config());
        let mut last = curve.buy_price(0.0);
        for i in 1..=1000 {
            let price = curve.buy_price(i as f64 * 100_000.0);
            assert!(price >= last);
            last = price;
        }
    }

    #[test]
    fn test_sell_price_constant() {
        let curve = PriceCurve::new(&config());
        assert_eq!(curve.sell_price(), 0.015);
        let sim = TradeSimulator::new(&config());
        for supply in [0.0, 1.0, 50_000_000.0, 99_999_999.0] {
            let quote = sim.quote_sell(100.0, supply, &unlocked()).unwrap();
            assert_eq!(quote.average_price, 0.015);
        }
    }

    #[test]
    fn test_cost_between_matches_trapezoid() {
        let curve = PriceCurve::new(&config());
        // Linear curve: integral equals the trapezoid
        let cost = curve.cost_between(0.0, 100_000_000.0);
        assert!((cost - 3_000_000.0).abs() < 1e-6);
        assert_eq!(curve.cost_between(10.0, 10.0), 0.0);
    }

    #[test]
    fn test_scenario_large_buy_converges_to_integral() {
        let cfg = config();
        let sim = TradeSimulator::new(&cfg);
        let quote = sim.quote_buy(2_000_000.0, 0.0).unwrap();

        let exact = exact_tokens(&cfg, 2_000_000.0);
        assert!((exact - 73_205_080.76).abs() < 1.0);
        let rel = (quote.output_amount - exact) / exact;
        assert!(rel >= 0.0);
        assert!(rel <= sim.max_error_bound() + 1e-9);

        // End price sits on the curve at the new supply
        let exact_end = (0.02f64 * 0.02 + 2.0 * 2e-10 * 2_000_000.0).sqrt();
        assert!((quote.end_price - exact_end).abs() < 1e-6);
        assert!(quote.price_impact_percent > 0.0);
        assert!((quote.price_impact_percent - 73.205).abs() < 0.01);
        assert!(!quote.partial_fill);
        assert_eq!(quote.input_amount, 2_000_000.0);
        assert!((quote.average_price - 2_000_000.0 / quote.output_amount).abs() < 1e-15);

        // The exact integral of what was bought recovers the budget within tolerance
        let cost = sim.curve().cost_between(0.0, quote.output_amount);
        assert!((cost - 2_000_000.0).abs() / 2_000_000.0 < 1e-5);
    }

    #[test]
    fn test_small_buy_has_negligible_impact() {
        let sim = TradeSimulator::new(&config());
        let quote = sim.quote_buy(100.0, 0.0).unwrap();
        // 0.02x + 1e-10x² = 100 on the exact curve
        let exact = ((0.02f64 * 0.02 + 4e-8).sqrt() - 0.02) / 2e-10;
        assert!((exact - 4_999.875).abs() < 1e-3);
        let rel = (quote.output_amount - exact) / exact;
        assert!(rel >= 0.0);
        assert!(rel <= sim.max_error_bound() + 1e-9);
        assert!((sim.curve().cost_between(0.0, quote.output_amount) - 100.0).abs() < 1e-3);
        assert!(quote.price_impact_percent >= 0.0);
        assert!(quote.price_impact_percent < 0.01);
        assert!((quote.fee_amount - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_quote_buy_idempotent() {
        let sim = TradeSimulator::new(&config());
        let a = sim.quote_buy(12_345.67, 31_000_000.0).unwrap();
        let b = sim.quote_buy(12_345.67, 31_000_000.0).unwrap();
        assert_eq!(a.output_amount, b.output_amount);
        assert_eq!(a.average_price, b.average_price);
        assert_eq!(a.price_impact_percent, b.price_impact_percent);
        assert_eq!(a.end_price, b.end_price);
    }

    #[test]
    fn test_buy_impact_non_negative_across_supply() {
        let sim = TradeSimulator::new(&config());
        for supply in [0.0, 10_000_000.0, 50_000_000.0, 99_000_000.0] {
            for usd in [1.0, 1_000.0, 250_000.0] {
                let quote = sim.quote_buy(usd, supply).unwrap();
                assert!(quote.price_impact_percent >= 0.0);
                assert!(quote.output_amount > 0.0);
            }
        }
    }

    #[test]
    fn test_buy_near_cap_is_partial_fill() {
        let sim = TradeSimulator::new(&config());
        let supply = 100_000_000.0 - 1_500.0;
        let quote = sim.quote_buy(1_000.0, supply).unwrap();
        assert!(quote.partial_fill);
        assert!((quote.output_amount - 1_500.0).abs() < 1e-6);
        assert!(quote.unspent_usd > 900.0);
        assert!((quote.input_amount + quote.unspent_usd - 1_000.0).abs() < 1e-9);
        assert!((quote.end_price - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_buy_at_cap_is_exhausted() {
        let sim = TradeSimulator::new(&config());
        let err = sim.quote_buy(10.0, 100_000_000.0).unwrap_err();
        assert!(matches!(err, SaleError::SupplyExhausted { .. }));
    }

    #[test]
    fn test_invalid_amounts() {
        let sim = TradeSimulator::new(&config());
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                sim.quote_buy(bad, 0.0),
                Err(SaleError::InvalidAmount { .. })
            ));
            assert!(matches!(
                sim.quote_sell(bad, 0.0, &unlocked()),
                Err(SaleError::InvalidAmount { .. })
            ));
        }
    }

    #[test]
    fn test_scenario_fixed_price_sell() {
        let sim = TradeSimulator::new(&config());
        let quote = sim.quote_sell(1_000.0, 50_000_000.0, &unlocked()).unwrap();
        assert_eq!(quote.output_amount, 15.0);
        assert_eq!(quote.price_impact_percent, 0.0);
        assert_eq!(quote.input_amount, 1_000.0);
        assert!((quote.fee_amount - 0.045).abs() < 1e-12);
    }

    #[test]
    fn test_sell_rejected_while_locked() {
        let sim = TradeSimulator::new(&config());
        let err = sim.quote_sell(1_000.0, 50_000_000.0, &locked()).unwrap_err();
        match err {
            SaleError::SellLocked { remaining_usd, .. } => assert_eq!(remaining_usd, 1.0),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_bound_with_production_constants() {
        let sim = TradeSimulator::new(&config());
        assert!((sim.max_error_bound() - 5e-6).abs() < 1e-18);
    }

    #[test]
    fn test_snapshot() {
        let curve = PriceCurve::new(&config());
        let supply = SupplyState::new(100_000_000.0, 25_000_000.0).unwrap();
        let snap = curve.snapshot(&supply, 1_000.0);
        assert!((snap.current_price - 0.025).abs() < 1e-15);
        assert!(snap.next_price > snap.current_price);
        assert_eq!(snap.remaining_supply, 75_000_000.0);
        assert!((snap.market_cap - 625_000.0).abs() < 1e-6);
        assert_eq!(snap.progress_percent, 25.0);
    }
}
