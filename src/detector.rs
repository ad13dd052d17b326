//! Opportunity detector (component J): turns a `PriceDelta` into a fully
//! costed `ArbitrageOpportunity`, gated by staleness and a minimum-profit
//! threshold (§4.J).

use crate::cost::gross_profit;
use crate::error::DexarbError;
use crate::events::{DetectorObserver, MonitorObserver};
use crate::gas::GasEstimator;
use crate::optimizer::optimize;
use crate::path::build_two_hop;
use crate::types::{ArbitrageOpportunity, DetectorConfig, OptimizerConfig, PriceDelta, PriceSnapshot};
use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Scales the smaller of the two input-side virtual reserves down before
/// handing it to the optimizer as `max_amount_override` — trading the
/// entire counterparty-side reserve is never realistic.
const RESERVE_SAFETY_FACTOR: f64 = 0.1;

pub struct OpportunityDetector {
    detector_config: DetectorConfig,
    optimizer_config: OptimizerConfig,
    gas_estimator: Arc<dyn GasEstimator>,
    stale: Arc<DashSet<String>>,
    observers: std::sync::Mutex<Vec<Arc<dyn DetectorObserver>>>,
    next_id: AtomicU64,
}

impl OpportunityDetector {
    pub fn new(
        detector_config: DetectorConfig,
        optimizer_config: OptimizerConfig,
        gas_estimator: Arc<dyn GasEstimator>,
    ) -> Self {
        Self {
            detector_config,
            optimizer_config,
            gas_estimator,
            stale: Arc::new(DashSet::new()),
            observers: std::sync::Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn DetectorObserver>) {
        self.observers.lock().expect("observer lock poisoned").push(observer);
    }

    /// Subscribes this detector to `monitor`'s `opportunity`/`stale`/
    /// `price_update` events (§4.J). The detector implements
    /// `MonitorObserver` directly, so attaching is just registering it.
    pub fn attach(self: &Arc<Self>, monitor: &crate::monitor::PriceMonitor) {
        monitor.subscribe(self.clone());
    }

    /// Clears the stale set. There is no corresponding unsubscribe on the
    /// monitor side — `attach`/`detach` govern only the detector's own
    /// state, matching the monitor's single-writer, many-reader event
    /// model (§5).
    pub fn detach(&self) {
        self.stale.clear();
    }

    async fn reject(&self, reason: String, delta: &PriceDelta) -> Option<ArbitrageOpportunity> {
        warn!(pair = %delta.pair_key, reason = %reason, "opportunity rejected");
        let observers = self.observers.lock().expect("observer lock poisoned").clone();
        for obs in &observers {
            obs.on_opportunity_rejected(&reason, delta).await;
        }
        None
    }

    pub async fn analyze_delta(&self, delta: &PriceDelta) -> Option<ArbitrageOpportunity> {
        let buy_addr = format!("{:#x}", delta.buy_pool.pool.address);
        let sell_addr = format!("{:#x}", delta.sell_pool.pool.address);
        if self.stale.contains(&buy_addr) || self.stale.contains(&sell_addr) {
            return self.reject("stale pool in path".to_string(), delta).await;
        }

        let path = build_two_hop(delta);

        let has_reserves = delta.buy_pool.reserves.is_some() || delta.buy_pool.liquidity.is_some();
        let has_reserves = has_reserves
            && (delta.sell_pool.reserves.is_some() || delta.sell_pool.liquidity.is_some());

        let config = self.detector_config.clone_for_optimizer();
        // Gas cost is a function of `path.steps.len()` only, not of the
        // traded amount, so it is fetched once and held fixed across every
        // point the optimizer samples.
        let (gas_cost, l1_data_fee) = self.gas_estimator.estimate(path.steps.len() as u32).await;

        let (input_amount, optimization_result) = if has_reserves {
            let max_override = max_amount_override(delta);
            let profit_fn = {
                let path = path.clone();
                let config = config.clone();
                move |x: f64| {
                    let gross = gross_profit(&path, x);
                    let cost = crate::cost::flash_loan_fee(&config, &path, x)
                        + gas_cost
                        + l1_data_fee.unwrap_or(0.0)
                        + crate::cost::slippage_cost(&path, x, config.max_slippage);
                    gross - cost
                }
            };
            let result = optimize(
                profit_fn,
                self.optimizer_config.min_amount,
                self.optimizer_config.max_amount,
                max_override,
                self.optimizer_config,
            );
            (result.optimal_amount, Some(result))
        } else {
            (self.detector_config.default_input_amount, None)
        };

        let gross = gross_profit(&path, input_amount);
        let flash_loan_fee = crate::cost::flash_loan_fee(&self.detector_config, &path, input_amount);
        let slippage_cost = crate::cost::slippage_cost(&path, input_amount, self.detector_config.max_slippage);
        let costs = crate::types::CostEstimate::new(flash_loan_fee, gas_cost, l1_data_fee, slippage_cost);
        let net_profit = gross - costs.total_cost;

        if net_profit <= 0.0 || net_profit < self.detector_config.min_profit_threshold {
            return self
                .reject(format!("net_profit {net_profit} below threshold {}", self.detector_config.min_profit_threshold), delta)
                .await;
        }

        let opportunity = ArbitrageOpportunity {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path,
            input_amount,
            gross_profit: gross,
            costs,
            net_profit,
            net_profit_percent: net_profit / input_amount * 100.0,
            delta: delta.clone(),
            block_number: delta.sell_pool.block_number.max(delta.buy_pool.block_number),
            timestamp_ms: delta.timestamp_ms,
            optimization_result,
        };

        info!(
            id = opportunity.id,
            pair = %delta.pair_key,
            input_amount = opportunity.input_amount,
            net_profit = opportunity.net_profit,
            "opportunity found"
        );

        let observers = self.observers.lock().expect("observer lock poisoned").clone();
        for obs in &observers {
            obs.on_opportunity_found(&opportunity).await;
        }
        Some(opportunity)
    }
}

/// Smaller of the two input-side virtual reserves (buy step trades
/// `token1`, sell step trades `token0`), scaled by the safety factor.
/// `None` when either side lacks reserve data.
fn max_amount_override(delta: &PriceDelta) -> Option<f64> {
    let buy_reserve = reserve_for_token1(&delta.buy_pool)?;
    let sell_reserve = reserve_for_token0(&delta.sell_pool)?;
    Some(buy_reserve.min(sell_reserve) * RESERVE_SAFETY_FACTOR)
}

fn reserve_for_token1(snapshot: &PriceSnapshot) -> Option<f64> {
    if let Some(reserves) = snapshot.reserves {
        let raw = crate::price_math::u256_to_f64(reserves[1]);
        return Some(raw / 10f64.powi(snapshot.pool.token1_decimals as i32));
    }
    if let (Some(liquidity), Some(sqrt_price_x96)) = (snapshot.liquidity, snapshot.sqrt_price_x96) {
        if liquidity == 0 || sqrt_price_x96.is_zero() {
            return None;
        }
        let sqrt_p = crate::price_math::u256_to_f64(sqrt_price_x96) / crate::price_math::TWO_POW_96;
        let raw = liquidity as f64 * sqrt_p;
        if !raw.is_finite() {
            return None;
        }
        return Some(raw / 10f64.powi(snapshot.pool.token1_decimals as i32));
    }
    None
}

fn reserve_for_token0(snapshot: &PriceSnapshot) -> Option<f64> {
    if let Some(reserves) = snapshot.reserves {
        let raw = crate::price_math::u256_to_f64(reserves[0]);
        return Some(raw / 10f64.powi(snapshot.pool.token0_decimals as i32));
    }
    if let (Some(liquidity), Some(sqrt_price_x96)) = (snapshot.liquidity, snapshot.sqrt_price_x96) {
        if liquidity == 0 || sqrt_price_x96.is_zero() {
            return None;
        }
        let sqrt_p = crate::price_math::u256_to_f64(sqrt_price_x96) / crate::price_math::TWO_POW_96;
        if sqrt_p == 0.0 {
            return None;
        }
        let raw = liquidity as f64 / sqrt_p;
        if !raw.is_finite() {
            return None;
        }
        return Some(raw / 10f64.powi(snapshot.pool.token0_decimals as i32));
    }
    None
}

#[async_trait]
impl MonitorObserver for OpportunityDetector {
    async fn on_opportunity(&self, delta: &PriceDelta) {
        let _ = self.analyze_delta(delta).await;
    }

    async fn on_stale(&self, pool: Address) {
        self.stale.insert(format!("{:#x}", pool));
    }

    async fn on_price_update(&self, snapshot: &PriceSnapshot) {
        self.stale.remove(&format!("{:#x}", snapshot.pool.address));
    }

    async fn on_error(&self, _pool: Address, err: &DexarbError) {
        let observers = self.observers.lock().expect("observer lock poisoned").clone();
        for obs in &observers {
            obs.on_error(err).await;
        }
    }
}

impl DetectorConfig {
    fn clone_for_optimizer(&self) -> DetectorConfig {
        self.clone()
    }
}
