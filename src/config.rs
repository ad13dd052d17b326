//! Config loader (component K, ambient): reads `.env` via `dotenv`, then
//! required env vars via `std::env::var`, and returns `ConfigError`
//! instead of panicking on any missing or malformed field (§4.K).

use crate::error::DexarbError;
use crate::types::{DetectorConfig, FlashLoanProvider, MonitorConfig, OptimizerConfig, PoolConfig, ProtocolVariant};
use alloy::primitives::Address;
use std::str::FromStr;

pub struct AppConfig {
    pub rpc_url: String,
    pub pools: Vec<PoolConfig>,
    pub monitor: MonitorConfig,
    pub detector: DetectorConfig,
    pub optimizer: OptimizerConfig,
}

/// Loads `.env` (if present) and every required variable, failing fast
/// with a `ConfigError` describing the first problem encountered.
pub fn load_config() -> Result<AppConfig, DexarbError> {
    dotenv::dotenv().ok();

    let rpc_url = require_env("RPC_URL")?;
    let pools_str = require_env("POOLS")?;
    let pools = parse_pools(&pools_str)?;

    let monitor = MonitorConfig {
        delta_threshold_percent: parse_env_or("DELTA_THRESHOLD_PERCENT", MonitorConfig::default().delta_threshold_percent)?,
        poll_interval_ms: parse_env_or("POLL_INTERVAL_MS", MonitorConfig::default().poll_interval_ms)?,
        max_retries: parse_env_or("MAX_RETRIES", MonitorConfig::default().max_retries)?,
        use_multicall: parse_env_or("USE_MULTICALL", MonitorConfig::default().use_multicall)?,
        min_reserve_weth: parse_env_or("MIN_RESERVE_WETH", MonitorConfig::default().min_reserve_weth)?,
        weth_address: optional_address_env("WETH_ADDRESS")?,
    };

    let detector = DetectorConfig {
        min_profit_threshold: parse_env_or("MIN_PROFIT_THRESHOLD", DetectorConfig::default().min_profit_threshold)?,
        max_slippage: parse_env_or("MAX_SLIPPAGE", DetectorConfig::default().max_slippage)?,
        default_input_amount: parse_env_or("DEFAULT_INPUT_AMOUNT", DetectorConfig::default().default_input_amount)?,
        gas_price_gwei: parse_env_or("GAS_PRICE_GWEI", DetectorConfig::default().gas_price_gwei)?,
        gas_per_swap: parse_env_or("GAS_PER_SWAP", DetectorConfig::default().gas_per_swap)?,
        flash_loan_fees: parse_flash_loan_fees()?,
    };

    let optimizer = OptimizerConfig {
        max_iterations: parse_env_or("OPTIMIZER_MAX_ITERATIONS", OptimizerConfig::default().max_iterations)?,
        timeout_ms: parse_env_or("OPTIMIZER_TIMEOUT_MS", OptimizerConfig::default().timeout_ms)?,
        fallback_amount: parse_env_or("OPTIMIZER_FALLBACK_AMOUNT", OptimizerConfig::default().fallback_amount)?,
        min_amount: parse_env_or("OPTIMIZER_MIN_AMOUNT", OptimizerConfig::default().min_amount)?,
        max_amount: parse_env_or("OPTIMIZER_MAX_AMOUNT", OptimizerConfig::default().max_amount)?,
        convergence_threshold: parse_env_or("OPTIMIZER_CONVERGENCE_THRESHOLD", OptimizerConfig::default().convergence_threshold)?,
    };

    Ok(AppConfig { rpc_url, pools, monitor, detector, optimizer })
}

fn require_env(key: &str) -> Result<String, DexarbError> {
    std::env::var(key).map_err(|_| DexarbError::config(format!("{key} not set")))
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, DexarbError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| DexarbError::config(format!("{key} is not a valid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn optional_address_env(key: &str) -> Result<Option<Address>, DexarbError> {
    match std::env::var(key) {
        Ok(raw) => Address::from_str(&raw)
            .map(Some)
            .map_err(|e| DexarbError::config(format!("{key} is not a valid address: {e}"))),
        Err(_) => Ok(None),
    }
}

/// `label:address:variant:token0:token1:dec0:dec1:fee` entries,
/// semicolon-separated. `fee` may be empty (parsed as `None`).
fn parse_pools(raw: &str) -> Result<Vec<PoolConfig>, DexarbError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_pool_entry)
        .collect()
}

fn parse_pool_entry(entry: &str) -> Result<PoolConfig, DexarbError> {
    let parts: Vec<&str> = entry.split(':').collect();
    if parts.len() != 8 {
        return Err(DexarbError::config(format!(
            "malformed POOLS entry (expected 8 fields, got {}): {entry}",
            parts.len()
        )));
    }
    let [label, address, variant, token0, token1, dec0, dec1, fee] = parts[..] else {
        unreachable!("length checked above");
    };

    let address = Address::from_str(address).map_err(|e| DexarbError::config(format!("bad pool address {address}: {e}")))?;
    let variant = ProtocolVariant::from_str(variant)?;
    let token0 = Address::from_str(token0).map_err(|e| DexarbError::config(format!("bad token0 {token0}: {e}")))?;
    let token1 = Address::from_str(token1).map_err(|e| DexarbError::config(format!("bad token1 {token1}: {e}")))?;
    let dec0: u8 = dec0.parse().map_err(|_| DexarbError::config(format!("bad token0 decimals: {dec0}")))?;
    let dec1: u8 = dec1.parse().map_err(|_| DexarbError::config(format!("bad token1 decimals: {dec1}")))?;
    let fee_tier = if fee.is_empty() {
        None
    } else {
        Some(fee.parse::<u32>().map_err(|_| DexarbError::config(format!("bad fee tier: {fee}")))?)
    };

    PoolConfig::new(label, variant, address, token0, token1, dec0, dec1, fee_tier, false)
}

/// `FLASH_LOAN_FEES` format: `name:rate` entries, semicolon-separated,
/// e.g. `aave-v3:0.0005;balancer:0`. Unset falls back to the built-in
/// default table.
fn parse_flash_loan_fees() -> Result<Vec<FlashLoanProvider>, DexarbError> {
    let Ok(raw) = std::env::var("FLASH_LOAN_FEES") else {
        return Ok(DetectorConfig::default().flash_loan_fees);
    };
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, rate) = entry
                .split_once(':')
                .ok_or_else(|| DexarbError::config(format!("malformed FLASH_LOAN_FEES entry: {entry}")))?;
            let rate: f64 = rate.parse().map_err(|_| DexarbError::config(format!("bad flash loan rate: {rate}")))?;
            Ok(FlashLoanProvider { name: name.to_string(), rate, token: None })
        })
        .collect()
}
