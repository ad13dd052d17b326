//! Cost model (component H): flash-loan fee, gas (via injected estimator
//! or the static default), and pool-aware slippage with a static
//! fallback. Also hosts `gross_profit`, shared with the input optimizer's
//! `profit_fn` (component I).

use crate::gas::GasEstimator;
use crate::types::{CostEstimate, DetectorConfig, SwapPath};

/// Constant-product default when a step carries no explicit `fee_tier`
/// (v2-style pools quote fee via the well-known 997/1000 factor, not an
/// on-chain-readable field).
const DEFAULT_V2_FEE: f64 = 0.003;

fn step_fee_fraction(fee_tier: Option<u32>) -> f64 {
    match fee_tier {
        Some(bps) => bps as f64 / 10_000.0,
        None => DEFAULT_V2_FEE,
    }
}

/// Runs `input_amount` through every step of `path`, applying each step's
/// trading fee and `expected_price` in turn. Returns the amount entering
/// each step (length `steps.len()`), plus the final output amount.
fn amounts_through_path(path: &SwapPath, input_amount: f64) -> (Vec<f64>, f64) {
    let mut amounts_in = Vec::with_capacity(path.steps.len());
    let mut current = input_amount;
    for step in &path.steps {
        amounts_in.push(current);
        let fee = step_fee_fraction(step.fee_tier);
        current *= (1.0 - fee) * step.expected_price;
    }
    (amounts_in, current)
}

/// `output(path, input_amount) - input_amount`, before any cost deduction.
pub fn gross_profit(path: &SwapPath, input_amount: f64) -> f64 {
    let (_, output) = amounts_through_path(path, input_amount);
    output - input_amount
}

/// Marginal price impact of trading `amount_in` against a constant-product
/// pool whose input-side reserve is `virtual_reserve_in`.
fn price_impact(amount_in: f64, virtual_reserve_in: f64) -> f64 {
    if virtual_reserve_in <= 0.0 {
        return 0.0;
    }
    amount_in / (virtual_reserve_in + amount_in)
}

/// Pool-aware slippage: `Some(cost)` when every step carries a
/// `virtual_reserve_in`, `None` otherwise (caller falls back to the
/// static model).
fn slippage_cost_pool_aware(path: &SwapPath, input_amount: f64) -> Option<f64> {
    let (amounts_in, _) = amounts_through_path(path, input_amount);
    let mut total = 0.0;
    for (amount_in, step) in amounts_in.iter().zip(&path.steps) {
        let reserve = step.virtual_reserve_in?;
        total += amount_in * price_impact(*amount_in, reserve);
    }
    Some(total)
}

/// `input x (1 - (1 - max_slippage)^n)` for an `n`-step path.
fn slippage_cost_static(input_amount: f64, max_slippage: f64, num_steps: usize) -> f64 {
    input_amount * (1.0 - (1.0 - max_slippage).powi(num_steps as i32))
}

/// Prefers the pool-aware model; falls back to the static model only when
/// at least one step has no reserve data (§4.H, §8 scenario 5).
pub fn slippage_cost(path: &SwapPath, input_amount: f64, max_slippage: f64) -> f64 {
    slippage_cost_pool_aware(path, input_amount)
        .unwrap_or_else(|| slippage_cost_static(input_amount, max_slippage, path.steps.len()))
}

/// Cheapest provider whose rate applies to `path.base_token`; `0.0` if the
/// provider table is empty (the caller is then borrowing for free, not an
/// error — an empty table only arises from a caller-supplied override).
pub fn flash_loan_fee(config: &DetectorConfig, path: &SwapPath, input_amount: f64) -> f64 {
    let rate = config
        .flash_loan_fees
        .iter()
        .filter(|p| p.token.is_none() || p.token == Some(path.base_token))
        .map(|p| p.rate)
        .fold(f64::INFINITY, f64::min);
    let rate = if rate.is_finite() { rate } else { 0.0 };
    input_amount * rate
}

/// Full cost estimate for trading `input_amount` through `path`: flash-loan
/// fee, gas (via `gas_estimator`), and slippage (pool-aware, static
/// fallback).
pub async fn estimate_cost(
    path: &SwapPath,
    input_amount: f64,
    config: &DetectorConfig,
    gas_estimator: &dyn GasEstimator,
) -> CostEstimate {
    let flash_loan_fee = flash_loan_fee(config, path, input_amount);
    let (gas_cost, l1_data_fee) = gas_estimator.estimate(path.steps.len() as u32).await;
    let slippage_cost = slippage_cost(path, input_amount, config.max_slippage);
    CostEstimate::new(flash_loan_fee, gas_cost, l1_data_fee, slippage_cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::StaticGasEstimator;
    use crate::types::{FlashLoanProvider, PoolConfig, ProtocolVariant, SwapStep};
    use alloy::primitives::Address;

    fn step(expected_price: f64, fee_tier: Option<u32>, virtual_reserve_in: Option<f64>) -> SwapStep {
        SwapStep {
            variant: ProtocolVariant::V2ConstProduct,
            pool_address: Address::from([1u8; 20]),
            token_in: Address::from([2u8; 20]),
            token_out: Address::from([3u8; 20]),
            decimals_in: 18,
            decimals_out: 18,
            expected_price,
            fee_tier,
            virtual_reserve_in,
        }
    }

    fn path(steps: Vec<SwapStep>) -> SwapPath {
        SwapPath { steps, base_token: Address::from([9u8; 20]) }
    }

    #[test]
    fn gross_profit_matches_scenario_3() {
        // buy step: expected_price = 1/2000; sell step: expected_price = 2020.
        let p = path(vec![step(1.0 / 2000.0, None, None), step(2020.0, None, None)]);
        let profit = gross_profit(&p, 10.0);
        assert!((profit - 0.0395).abs() < 1e-3, "got {profit}");
    }

    #[test]
    fn pool_aware_slippage_beats_static_in_scenario_5() {
        let p = path(vec![
            step(1.0 / 2000.0, None, Some(2_000_000.0)),
            step(2020.0, None, Some(1000.0)),
        ]);
        let pool_aware = slippage_cost(&p, 10.0, 0.005);
        let static_cost = slippage_cost_static(10.0, 0.005, 2);
        assert!(pool_aware <= 0.01, "got {pool_aware}");
        assert!((static_cost - 0.09975).abs() < 1e-6, "got {static_cost}");
        assert!(pool_aware < static_cost);
    }

    #[test]
    fn static_fallback_used_when_any_step_lacks_reserve() {
        let p = path(vec![step(1.0 / 2000.0, None, Some(2_000_000.0)), step(2020.0, None, None)]);
        let cost = slippage_cost(&p, 10.0, 0.005);
        assert!((cost - slippage_cost_static(10.0, 0.005, 2)).abs() < 1e-12);
    }

    #[test]
    fn flash_loan_fee_picks_cheapest_applicable_provider() {
        let mut config = DetectorConfig::default();
        config.flash_loan_fees = vec![
            FlashLoanProvider { name: "aave-v3".into(), rate: 0.0005, token: None },
            FlashLoanProvider { name: "balancer".into(), rate: 0.0, token: None },
        ];
        let p = path(vec![step(1.0, None, None)]);
        assert_eq!(flash_loan_fee(&config, &p, 10.0), 0.0);
    }

    #[tokio::test]
    async fn estimate_cost_total_has_no_hidden_terms() {
        let config = DetectorConfig::default();
        let estimator = StaticGasEstimator::new(0.0, 150_000);
        let p = path(vec![step(1.0 / 2000.0, None, None), step(2020.0, None, None)]);
        let cost = estimate_cost(&p, 10.0, &config, &estimator).await;
        let expected = cost.flash_loan_fee + cost.gas_cost + cost.l1_data_fee.unwrap_or(0.0) + cost.slippage_cost;
        assert!((cost.total_cost - expected).abs() < 1e-12);
    }
}
