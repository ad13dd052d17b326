//! Error taxonomy for the arbitrage core.
//!
//! Every fallible public function returns `Result<T, DexarbError>`. No
//! component wraps an arbitrary caught value into the error type — each
//! variant carries the context a caller actually needs to act on.

use alloy::primitives::Address;
use thiserror::Error;

/// Errors surfaced by the polling, pricing, and detection pipeline.
#[derive(Debug, Error)]
pub enum DexarbError {
    /// The underlying `eth_call`/`eth_blockNumber` failed or returned
    /// unusable bytes. The transport itself never retries.
    #[error("transport call to {pool} failed: {source}")]
    TransportFailure {
        pool: Address,
        #[source]
        source: anyhow::Error,
    },

    /// Return data did not match the expected ABI shape, including a
    /// Multicall3 sub-call marked `success = false`.
    #[error("decode failure for {pool}: {reason}")]
    DecodeFailure { pool: Address, reason: String },

    /// A v2 pool's WETH-side reserve fell below `min_reserve_weth`.
    #[error("pool {pool} reserve below configured minimum")]
    LowLiquidity { pool: Address },

    /// The detector rejected an opportunity because one of its pools is
    /// in the stale set.
    #[error("stale input: pool {pool} has not refreshed within max_retries")]
    StaleInput { pool: Address },

    /// The detector rejected an opportunity because net profit fell
    /// below `min_profit_threshold`.
    #[error("unprofitable opportunity: net_profit {net_profit} < threshold {threshold}")]
    UnprofitableOpportunity { net_profit: f64, threshold: f64 },

    /// The input optimizer hit its wall-clock timeout before converging.
    #[error("optimizer timed out after {elapsed_ms}ms")]
    OptimizerTimeout { elapsed_ms: u64 },

    /// The optimizer converged (or ran out of iterations) but the best
    /// size found was not profitable.
    #[error("optimizer found no profitable input size")]
    OptimizerNoProfit,

    /// The optimizer reached `max_iterations` without converging.
    #[error("optimizer reached max_iterations ({max_iterations}) without converging")]
    OptimizerMaxIter { max_iterations: u32 },

    /// A pool or monitor/detector/optimizer configuration was invalid.
    /// Raised eagerly, at construction or first use, never mid-cycle.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl DexarbError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DexarbError::ConfigError(msg.into())
    }
}
