//! Gas estimator interface (consumed, optional) and the static default
//! the cost model falls back to when none is injected (§4.H, §6).

use async_trait::async_trait;

/// Pure function of the number of swaps in a path. May itself call the
/// transport (e.g. to read an L2's gas oracle) but holds no state.
#[async_trait]
pub trait GasEstimator: Send + Sync {
    /// Returns `(gas_cost_eth, l1_data_fee_eth)`.
    async fn estimate(&self, num_swaps: u32) -> (f64, Option<f64>);
}

/// `(21_000 + gas_per_swap * steps) * gas_price_gwei * 1e-9`, with the
/// spec's defaults (30 gwei, 150k gas/swap). Used when the caller injects
/// no estimator.
pub struct StaticGasEstimator {
    pub gas_price_gwei: f64,
    pub gas_per_swap: u64,
}

impl StaticGasEstimator {
    pub fn new(gas_price_gwei: f64, gas_per_swap: u64) -> Self {
        Self { gas_price_gwei, gas_per_swap }
    }
}

#[async_trait]
impl GasEstimator for StaticGasEstimator {
    async fn estimate(&self, num_swaps: u32) -> (f64, Option<f64>) {
        let gas_units = 21_000.0 + self.gas_per_swap as f64 * num_swaps as f64;
        let cost = gas_units * self.gas_price_gwei * 1e-9;
        (cost, None)
    }
}
