//! Core data structures: pool configuration, snapshots, deltas, swap paths,
//! cost estimates, and the opportunities the detector emits.

use crate::error::DexarbError;
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pool shapes the price-math and codec layers understand. Aliases on
/// well-known forks (sushi, camelot, ramses, trader-joe) parse to one of
/// the four canonical shapes — there is no separate wire format per fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// Uniswap-v2-style constant product (`getReserves`).
    V2ConstProduct,
    /// Uniswap-v3-style concentrated liquidity (`slot0`).
    V3Concentrated,
    /// Algebra-style concentrated liquidity (`globalState`, dynamic fee).
    AlgebraV3,
    /// Trader-Joe Liquidity Book discrete bins (`getActiveId`).
    LbBin,
}

impl ProtocolVariant {
    /// Returns true for either v3 family (used to decide whether a
    /// `liquidity()` sub-call should be batched alongside the price call).
    pub fn is_v3_family(&self) -> bool {
        matches!(self, ProtocolVariant::V3Concentrated | ProtocolVariant::AlgebraV3)
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::V2ConstProduct => write!(f, "v2-const-product"),
            ProtocolVariant::V3Concentrated => write!(f, "v3-concentrated"),
            ProtocolVariant::AlgebraV3 => write!(f, "algebra-v3"),
            ProtocolVariant::LbBin => write!(f, "lb-bin"),
        }
    }
}

impl std::str::FromStr for ProtocolVariant {
    type Err = DexarbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v2-const-product" | "v2" | "sushi-v2" | "camelot-v2" => {
                Ok(ProtocolVariant::V2ConstProduct)
            }
            "v3-concentrated" | "v3" | "sushi-v3" | "camelot-v3" | "ramses-v3" => {
                Ok(ProtocolVariant::V3Concentrated)
            }
            "algebra-v3" | "algebra" => Ok(ProtocolVariant::AlgebraV3),
            "lb-bin" | "trader-joe-lb" | "lb" => Ok(ProtocolVariant::LbBin),
            other => Err(DexarbError::config(format!(
                "unknown protocol variant alias: {other}"
            ))),
        }
    }
}

/// Immutable configuration for one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub label: String,
    pub variant: ProtocolVariant,
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    /// bps for v3-family, binStep for lb-bin, unused for v2.
    pub fee_tier: Option<u32>,
    /// Set when the LB pair's token ordering disagrees with the
    /// hex-sort convention used downstream for canonicalization.
    pub invert_price: bool,
}

impl PoolConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: impl Into<String>,
        variant: ProtocolVariant,
        address: Address,
        token0: Address,
        token1: Address,
        token0_decimals: u8,
        token1_decimals: u8,
        fee_tier: Option<u32>,
        invert_price: bool,
    ) -> Result<Self, DexarbError> {
        if token0_decimals > 30 || token1_decimals > 30 {
            return Err(DexarbError::config(format!(
                "decimals out of range [0,30]: {} {}",
                token0_decimals, token1_decimals
            )));
        }
        if variant == ProtocolVariant::LbBin {
            let bin_step = fee_tier.ok_or_else(|| {
                DexarbError::config("lb-bin pool missing feeTier (binStep)")
            })?;
            if !(1..=10_000).contains(&bin_step) {
                return Err(DexarbError::config(format!(
                    "binStep {bin_step} out of range [1,10000]"
                )));
            }
        }
        Ok(Self {
            label: label.into(),
            variant,
            address,
            token0,
            token1,
            token0_decimals,
            token1_decimals,
            fee_tier,
            invert_price,
        })
    }

    /// Canonical pair key: `min(token0,token1)/max(token0,token1)` lowercased.
    pub fn canonical_pair_key(&self) -> String {
        canonical_pair_key(self.token0, self.token1)
    }

    pub fn lowercased_address(&self) -> String {
        format!("{:#x}", self.address)
    }
}

/// `min(a,b)/max(a,b)` lowercased — the grouping key used by delta
/// grouping and by the snapshot cache's stale-set bookkeeping.
pub fn canonical_pair_key(a: Address, b: Address) -> String {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    format!("{:#x}/{:#x}", lo, hi)
}

/// A single successful price fetch.
#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    pub pool: PoolConfig,
    /// token1-per-token0, decimal-adjusted.
    pub price: f64,
    pub inverse_price: f64,
    pub block_number: u64,
    pub timestamp_ms: u64,
    /// Raw [r0, r1] reserves — v2 only.
    pub reserves: Option<[U256; 2]>,
    /// In-range liquidity — v3-family only.
    pub liquidity: Option<u128>,
    /// sqrtPriceX96 — v3-family only.
    pub sqrt_price_x96: Option<U256>,
    /// Active bin id — lb-bin only.
    pub active_id: Option<u32>,
}

impl PriceSnapshot {
    /// Builds a snapshot, enforcing the `price > 0` invariant. Returns
    /// `None` (and the caller must treat that as a per-pool error) when
    /// price is non-positive, e.g. a v2 pool with zero reserves.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PoolConfig,
        price: f64,
        block_number: u64,
        timestamp_ms: u64,
        reserves: Option<[U256; 2]>,
        liquidity: Option<u128>,
        sqrt_price_x96: Option<U256>,
        active_id: Option<u32>,
    ) -> Option<Self> {
        if !(price > 0.0) || !price.is_finite() {
            return None;
        }
        Some(Self {
            pool,
            price,
            inverse_price: 1.0 / price,
            block_number,
            timestamp_ms,
            reserves,
            liquidity,
            sqrt_price_x96,
            active_id,
        })
    }

    pub fn pair_key(&self) -> String {
        self.pool.canonical_pair_key()
    }
}

/// Emitted when two fresh snapshots of the same canonical pair diverge by
/// at least the monitor's configured threshold.
#[derive(Debug, Clone)]
pub struct PriceDelta {
    pub pair_key: String,
    pub buy_pool: PriceSnapshot,
    pub sell_pool: PriceSnapshot,
    pub delta_percent: f64,
    pub timestamp_ms: u64,
}

/// One leg of a constructed swap path.
#[derive(Debug, Clone)]
pub struct SwapStep {
    pub variant: ProtocolVariant,
    pub pool_address: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub decimals_in: u8,
    pub decimals_out: u8,
    /// The price (token_out-per-token_in) this step was costed against.
    pub expected_price: f64,
    pub fee_tier: Option<u32>,
    /// Decimal-adjusted reserve/liquidity on the input side, used by the
    /// pool-aware slippage model. `None` when unavailable.
    pub virtual_reserve_in: Option<f64>,
}

/// A fully constructed round-trip path.
#[derive(Debug, Clone)]
pub struct SwapPath {
    pub steps: Vec<SwapStep>,
    /// The token the round trip starts and ends with.
    pub base_token: Address,
}

/// Costed components of executing a path.
#[derive(Debug, Clone, Copy)]
pub struct CostEstimate {
    pub flash_loan_fee: f64,
    pub gas_cost: f64,
    pub l1_data_fee: Option<f64>,
    pub slippage_cost: f64,
    pub total_cost: f64,
}

impl CostEstimate {
    pub fn new(flash_loan_fee: f64, gas_cost: f64, l1_data_fee: Option<f64>, slippage_cost: f64) -> Self {
        let total_cost = flash_loan_fee + gas_cost + l1_data_fee.unwrap_or(0.0) + slippage_cost;
        Self {
            flash_loan_fee,
            gas_cost,
            l1_data_fee,
            slippage_cost,
            total_cost,
        }
    }
}

/// Result of the ternary-search input sizer (see `optimizer.rs`).
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub optimal_amount: f64,
    pub expected_profit: f64,
    pub iterations: u32,
    pub duration_ms: u64,
    pub converged: bool,
    pub fallback_reason: Option<String>,
}

/// A fully-costed, net-profitable arbitrage candidate.
#[derive(Debug, Clone)]
pub struct ArbitrageOpportunity {
    pub id: u64,
    pub path: SwapPath,
    pub input_amount: f64,
    pub gross_profit: f64,
    pub costs: CostEstimate,
    pub net_profit: f64,
    pub net_profit_percent: f64,
    pub delta: PriceDelta,
    pub block_number: u64,
    pub timestamp_ms: u64,
    pub optimization_result: Option<OptimizationResult>,
}

/// Named, per-provider flash-loan rate.
#[derive(Debug, Clone)]
pub struct FlashLoanProvider {
    pub name: String,
    /// Fractional rate, e.g. 0.0005 for 0.05%.
    pub rate: f64,
    /// `None` means the rate applies to any borrowable token.
    pub token: Option<Address>,
}

/// Monitor (component E) configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub delta_threshold_percent: f64,
    pub poll_interval_ms: u64,
    pub max_retries: u32,
    pub use_multicall: bool,
    pub min_reserve_weth: f64,
    pub weth_address: Option<Address>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            delta_threshold_percent: 0.5,
            poll_interval_ms: 12_000,
            max_retries: 3,
            use_multicall: true,
            min_reserve_weth: 0.0,
            weth_address: None,
        }
    }
}

/// Detector (component J) / cost model (component H) configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub min_profit_threshold: f64,
    pub max_slippage: f64,
    pub default_input_amount: f64,
    pub gas_price_gwei: f64,
    pub gas_per_swap: u64,
    pub flash_loan_fees: Vec<FlashLoanProvider>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold: 0.0,
            max_slippage: 0.005,
            default_input_amount: 10.0,
            gas_price_gwei: 30.0,
            gas_per_swap: 150_000,
            flash_loan_fees: vec![
                FlashLoanProvider { name: "aave-v3".into(), rate: 0.0005, token: None },
                FlashLoanProvider { name: "balancer".into(), rate: 0.0, token: None },
                FlashLoanProvider { name: "dydx".into(), rate: 0.0, token: None },
            ],
        }
    }
}

/// Input optimizer (component I) configuration.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    pub max_iterations: u32,
    pub timeout_ms: u64,
    pub fallback_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,
    pub convergence_threshold: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            timeout_ms: 100,
            fallback_amount: 10.0,
            min_amount: 1.0,
            max_amount: 1000.0,
            convergence_threshold: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = byte;
        Address::from(bytes)
    }

    #[test]
    fn canonical_pair_key_is_order_independent() {
        let a = addr(1);
        let b = addr(2);
        assert_eq!(canonical_pair_key(a, b), canonical_pair_key(b, a));
    }

    #[test]
    fn snapshot_rejects_non_positive_price() {
        let pool = PoolConfig::new(
            "x",
            ProtocolVariant::V2ConstProduct,
            addr(1),
            addr(2),
            addr(3),
            18,
            6,
            None,
            false,
        )
        .unwrap();
        assert!(PriceSnapshot::new(pool.clone(), 0.0, 1, 1, None, None, None, None).is_none());
        assert!(PriceSnapshot::new(pool, -1.0, 1, 1, None, None, None, None).is_none());
    }

    #[test]
    fn snapshot_inverse_price_round_trips() {
        let pool = PoolConfig::new(
            "x",
            ProtocolVariant::V2ConstProduct,
            addr(1),
            addr(2),
            addr(3),
            18,
            6,
            None,
            false,
        )
        .unwrap();
        let snap = PriceSnapshot::new(pool, 2000.0, 10, 10, None, None, None, None).unwrap();
        assert!((snap.price * snap.inverse_price - 1.0).abs() < 1e-9);
    }

    #[test]
    fn lb_bin_requires_fee_tier_in_range() {
        let err = PoolConfig::new(
            "lb",
            ProtocolVariant::LbBin,
            addr(1),
            addr(2),
            addr(3),
            18,
            18,
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DexarbError::ConfigError(_)));

        let err = PoolConfig::new(
            "lb",
            ProtocolVariant::LbBin,
            addr(1),
            addr(2),
            addr(3),
            18,
            18,
            Some(20_000),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DexarbError::ConfigError(_)));
    }

    #[test]
    fn protocol_variant_aliases_parse() {
        use std::str::FromStr;
        assert_eq!(ProtocolVariant::from_str("sushi-v2").unwrap(), ProtocolVariant::V2ConstProduct);
        assert_eq!(ProtocolVariant::from_str("ramses-v3").unwrap(), ProtocolVariant::V3Concentrated);
        assert_eq!(ProtocolVariant::from_str("trader-joe-lb").unwrap(), ProtocolVariant::LbBin);
        assert!(ProtocolVariant::from_str("nonsense").is_err());
    }
}
