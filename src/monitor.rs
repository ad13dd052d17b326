//! Price monitor (component E): the poll loop. Builds one batched
//! Multicall3 `aggregate3` per cycle when enabled, falls back to
//! concurrent per-pool calls on a transport-level multicall failure,
//! updates the snapshot cache, and hands the fresh set to delta grouping
//! (component F) for opportunity emission (§4.E).

use crate::cache::SnapshotCache;
use crate::codec::{self, BatchCall};
use crate::delta::group_and_emit;
use crate::error::DexarbError;
use crate::events::MonitorObserver;
use crate::price_math::{lb_price, v2_price, v3_price};
use crate::transport::RpcTransport;
use crate::types::{MonitorConfig, PoolConfig, PriceSnapshot, ProtocolVariant};
use alloy::primitives::Address;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct PriceMonitor {
    pools: Vec<PoolConfig>,
    transport: Arc<dyn RpcTransport>,
    cache: SnapshotCache,
    config: MonitorConfig,
    observers: Mutex<Vec<Arc<dyn MonitorObserver>>>,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PriceMonitor {
    pub fn new(pools: Vec<PoolConfig>, transport: Arc<dyn RpcTransport>, config: MonitorConfig) -> Self {
        Self {
            pools,
            transport,
            cache: SnapshotCache::new(),
            config,
            observers: Mutex::new(Vec::new()),
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn MonitorObserver>) {
        self.observers.lock().expect("observer lock poisoned").push(observer);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, addr: &str) -> Option<PriceSnapshot> {
        self.cache.get(addr).and_then(|e| e.snapshot)
    }

    pub fn all_snapshots(&self) -> Vec<PriceSnapshot> {
        self.cache.all_snapshots()
    }

    /// Idempotent: a second `start()` while already running is a no-op.
    /// Spawns a background task that polls immediately, then every
    /// `poll_interval_ms`.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        let stop = self.stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(this.config.poll_interval_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = this.poll().await;
                    }
                    _ = stop.notified() => break,
                }
            }
        });
        *self.task.lock().expect("task lock poisoned") = Some(handle);
    }

    /// Idempotent: signals the poll loop to exit after its current cycle
    /// and waits for the task to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop.notify_one();
        let handle = self.task.lock().expect("task lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// A single poll cycle: batched multicall when enabled (falling back
    /// to per-pool fetches on a transport-level failure), cache update,
    /// then delta grouping over the fresh set only.
    pub async fn poll(&self) -> Result<(), DexarbError> {
        debug!(pools = self.pools.len(), use_multicall = self.config.use_multicall, "starting poll cycle");

        let results = if self.config.use_multicall {
            match self.poll_multicall().await {
                Ok(results) => results,
                Err(err) => {
                    warn!(error = %err, "multicall batch failed, falling back to per-pool calls");
                    self.poll_fallback().await
                }
            }
        } else {
            self.poll_fallback().await
        };

        let mut fresh = Vec::new();
        for (pool, result) in self.pools.iter().zip(results) {
            let addr = pool.lowercased_address();
            match result {
                Ok(snapshot) => {
                    self.cache.record_success(&addr, snapshot.clone(), snapshot.block_number);
                    debug!(pool = %pool.label, price = snapshot.price, block = snapshot.block_number, "price updated");
                    self.notify_price_update(&snapshot).await;
                    fresh.push(snapshot);
                }
                Err(err) => {
                    warn!(pool = %pool.label, error = %err, "pool fetch failed");
                    self.notify_error(pool.address, &err).await;
                    if self.cache.record_error(&addr, self.config.max_retries) {
                        warn!(pool = %pool.label, max_retries = self.config.max_retries, "pool crossed into stale");
                        self.notify_stale(pool.address).await;
                    }
                }
            }
        }

        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        let deltas = group_and_emit(&fresh, self.config.delta_threshold_percent, now_ms);
        debug!(fresh = fresh.len(), deltas = deltas.len(), "poll cycle complete");
        for delta in deltas {
            self.notify_opportunity(&delta).await;
        }
        Ok(())
    }

    async fn notify_price_update(&self, snapshot: &PriceSnapshot) {
        let observers = self.observers.lock().expect("observer lock poisoned").clone();
        for obs in &observers {
            obs.on_price_update(snapshot).await;
        }
    }

    async fn notify_error(&self, pool: Address, err: &DexarbError) {
        let observers = self.observers.lock().expect("observer lock poisoned").clone();
        for obs in &observers {
            obs.on_error(pool, err).await;
        }
    }

    async fn notify_stale(&self, pool: Address) {
        let observers = self.observers.lock().expect("observer lock poisoned").clone();
        for obs in &observers {
            obs.on_stale(pool).await;
        }
    }

    async fn notify_opportunity(&self, delta: &crate::types::PriceDelta) {
        let observers = self.observers.lock().expect("observer lock poisoned").clone();
        for obs in &observers {
            obs.on_opportunity(delta).await;
        }
    }

    /// One `aggregate3` batching every pool's price call, plus a
    /// `liquidity` call for each v3-family pool. `Err` only on a
    /// transport-level failure of the batch call itself or a malformed
    /// top-level response — the caller then falls back to step 2.
    async fn poll_multicall(&self) -> Result<Vec<Result<PriceSnapshot, DexarbError>>, DexarbError> {
        let mut batch = Vec::new();
        let mut calls_per_pool = Vec::with_capacity(self.pools.len());
        for pool in &self.pools {
            batch.push(BatchCall { target: pool.address, call_data: primary_call_data(pool) });
            if pool.variant.is_v3_family() {
                batch.push(BatchCall { target: pool.address, call_data: codec::encode_liquidity() });
                calls_per_pool.push(2);
            } else {
                calls_per_pool.push(1);
            }
        }

        let block_number = self.transport.block_number().await?;
        let encoded = codec::encode_aggregate3(&batch);
        let response = self.transport.call(codec::MULTICALL3_ADDRESS, encoded).await?;
        let decoded = codec::decode_aggregate3_result(&response)?;

        let mut cursor = 0;
        let mut results = Vec::with_capacity(self.pools.len());
        for (pool, n) in self.pools.iter().zip(calls_per_pool) {
            let slice = &decoded[cursor..cursor + n];
            cursor += n;
            results.push(decode_pool_result(pool, slice, block_number, &self.config));
        }
        Ok(results)
    }

    /// Per-pool concurrent fallback, bounded only by the transport's own
    /// connection concurrency.
    async fn poll_fallback(&self) -> Vec<Result<PriceSnapshot, DexarbError>> {
        join_all(self.pools.iter().map(|pool| self.fetch_price(pool))).await
    }

    /// Single-pool fetch: the fallback path's unit of work, and directly
    /// exercised by tests.
    pub async fn fetch_price(&self, pool: &PoolConfig) -> Result<PriceSnapshot, DexarbError> {
        let block_number = self.transport.block_number().await?;
        match pool.variant {
            ProtocolVariant::V2ConstProduct => {
                let data = self.transport.call(pool.address, codec::encode_get_reserves()).await?;
                let reserves = codec::decode_get_reserves(&data)?;
                check_weth_liquidity(pool, &reserves, &self.config)?;
                let price = v2_price(reserves.reserve0, reserves.reserve1, pool.token0_decimals, pool.token1_decimals);
                PriceSnapshot::new(
                    pool.clone(),
                    price,
                    block_number,
                    now_ms(),
                    Some([reserves.reserve0, reserves.reserve1]),
                    None,
                    None,
                    None,
                )
                .ok_or_else(|| DexarbError::DecodeFailure { pool: pool.address, reason: "zero reserve".to_string() })
            }
            ProtocolVariant::V3Concentrated => {
                let data = self.transport.call(pool.address, codec::encode_slot0()).await?;
                let slot = codec::decode_slot0(&data)?;
                let liq_data = self.transport.call(pool.address, codec::encode_liquidity()).await?;
                let liquidity = codec::decode_liquidity(&liq_data)?;
                let price = v3_price(slot.sqrt_price_x96, pool.token0_decimals, pool.token1_decimals);
                PriceSnapshot::new(pool.clone(), price, block_number, now_ms(), None, Some(liquidity), Some(slot.sqrt_price_x96), None)
                    .ok_or_else(|| DexarbError::DecodeFailure { pool: pool.address, reason: "non-positive price".to_string() })
            }
            ProtocolVariant::AlgebraV3 => {
                let data = self.transport.call(pool.address, codec::encode_global_state()).await?;
                let slot = codec::decode_global_state(&data)?;
                let liq_data = self.transport.call(pool.address, codec::encode_liquidity()).await?;
                let liquidity = codec::decode_liquidity(&liq_data)?;
                let price = v3_price(slot.sqrt_price_x96, pool.token0_decimals, pool.token1_decimals);
                PriceSnapshot::new(pool.clone(), price, block_number, now_ms(), None, Some(liquidity), Some(slot.sqrt_price_x96), None)
                    .ok_or_else(|| DexarbError::DecodeFailure { pool: pool.address, reason: "non-positive price".to_string() })
            }
            ProtocolVariant::LbBin => {
                let data = self.transport.call(pool.address, codec::encode_get_active_id()).await?;
                let active_id = codec::decode_get_active_id(&data)?;
                let bin_step = pool.fee_tier.ok_or_else(|| DexarbError::ConfigError("lb-bin pool missing binStep".to_string()))?;
                let price = lb_price(active_id, bin_step, pool.token0_decimals, pool.token1_decimals, pool.invert_price);
                PriceSnapshot::new(pool.clone(), price, block_number, now_ms(), None, None, None, Some(active_id))
                    .ok_or_else(|| DexarbError::DecodeFailure { pool: pool.address, reason: "non-positive price".to_string() })
            }
        }
    }
}

fn primary_call_data(pool: &PoolConfig) -> alloy::primitives::Bytes {
    match pool.variant {
        ProtocolVariant::V2ConstProduct => codec::encode_get_reserves(),
        ProtocolVariant::V3Concentrated => codec::encode_slot0(),
        ProtocolVariant::AlgebraV3 => codec::encode_global_state(),
        ProtocolVariant::LbBin => codec::encode_get_active_id(),
    }
}

fn decode_pool_result(
    pool: &PoolConfig,
    results: &[codec::BatchResult],
    block_number: u64,
    config: &MonitorConfig,
) -> Result<PriceSnapshot, DexarbError> {
    let primary = &results[0];
    if !primary.success {
        return Err(DexarbError::TransportFailure {
            pool: pool.address,
            source: anyhow::anyhow!("multicall sub-call reverted"),
        });
    }

    match pool.variant {
        ProtocolVariant::V2ConstProduct => {
            let reserves = codec::decode_get_reserves(&primary.return_data)?;
            check_weth_liquidity(pool, &reserves, config)?;
            let price = v2_price(reserves.reserve0, reserves.reserve1, pool.token0_decimals, pool.token1_decimals);
            PriceSnapshot::new(
                pool.clone(),
                price,
                block_number,
                now_ms(),
                Some([reserves.reserve0, reserves.reserve1]),
                None,
                None,
                None,
            )
            .ok_or_else(|| DexarbError::DecodeFailure { pool: pool.address, reason: "zero reserve".to_string() })
        }
        ProtocolVariant::V3Concentrated | ProtocolVariant::AlgebraV3 => {
            let slot = if pool.variant == ProtocolVariant::V3Concentrated {
                codec::decode_slot0(&primary.return_data)?
            } else {
                codec::decode_global_state(&primary.return_data)?
            };
            let liquidity_result = &results[1];
            if !liquidity_result.success {
                return Err(DexarbError::TransportFailure {
                    pool: pool.address,
                    source: anyhow::anyhow!("liquidity sub-call reverted"),
                });
            }
            let liquidity = codec::decode_liquidity(&liquidity_result.return_data)?;
            let price = v3_price(slot.sqrt_price_x96, pool.token0_decimals, pool.token1_decimals);
            PriceSnapshot::new(pool.clone(), price, block_number, now_ms(), None, Some(liquidity), Some(slot.sqrt_price_x96), None)
                .ok_or_else(|| DexarbError::DecodeFailure { pool: pool.address, reason: "non-positive price".to_string() })
        }
        ProtocolVariant::LbBin => {
            let active_id = codec::decode_get_active_id(&primary.return_data)?;
            let bin_step = pool.fee_tier.ok_or_else(|| DexarbError::ConfigError("lb-bin pool missing binStep".to_string()))?;
            let price = lb_price(active_id, bin_step, pool.token0_decimals, pool.token1_decimals, pool.invert_price);
            PriceSnapshot::new(pool.clone(), price, block_number, now_ms(), None, None, None, Some(active_id))
                .ok_or_else(|| DexarbError::DecodeFailure { pool: pool.address, reason: "non-positive price".to_string() })
        }
    }
}

/// When `weth_address` is configured and this v2 pool holds WETH on
/// either side, rejects the fetch if that side's decimal-adjusted
/// reserve falls below `min_reserve_weth` (§4.E).
fn check_weth_liquidity(pool: &PoolConfig, reserves: &codec::Reserves, config: &MonitorConfig) -> Result<(), DexarbError> {
    let Some(weth) = config.weth_address else { return Ok(()) };
    if config.min_reserve_weth <= 0.0 {
        return Ok(());
    }
    let weth_reserve = if pool.token0 == weth {
        Some((reserves.reserve0, pool.token0_decimals))
    } else if pool.token1 == weth {
        Some((reserves.reserve1, pool.token1_decimals))
    } else {
        None
    };
    if let Some((raw, decimals)) = weth_reserve {
        let adjusted = crate::price_math::u256_to_f64(raw) / 10f64.powi(decimals as i32);
        if adjusted < config.min_reserve_weth {
            return Err(DexarbError::LowLiquidity { pool: pool.address });
        }
    }
    Ok(())
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::MockTransport;
    use crate::types::ProtocolVariant;
    use alloy::sol_types::SolValue;

    fn weth() -> Address {
        Address::from([0xEE; 20])
    }
    fn usdc() -> Address {
        Address::from([0x55; 20])
    }

    fn v2_pool(addr_byte: u8) -> PoolConfig {
        PoolConfig::new(
            format!("pool{addr_byte}"),
            ProtocolVariant::V2ConstProduct,
            Address::from([addr_byte; 20]),
            weth(),
            usdc(),
            18,
            6,
            None,
            false,
        )
        .unwrap()
    }

    fn reserves_payload(r0: u128, r1: u128, ts: u32) -> alloy::primitives::Bytes {
        alloy::primitives::Bytes::from((r0, r1, ts).abi_encode_sequence())
    }

    #[tokio::test]
    async fn poll_emits_opportunity_for_one_percent_spread() {
        let transport = Arc::new(MockTransport::new(100));
        let pool_x = v2_pool(1);
        let pool_y = v2_pool(2);
        transport.set_response(
            pool_x.address,
            [0x09, 0x02, 0xf1, 0xac],
            reserves_payload(1000_000_000_000_000_000_000u128, 2_000_000_000_000u128, 1),
        );
        transport.set_response(
            pool_y.address,
            [0x09, 0x02, 0xf1, 0xac],
            reserves_payload(1000_000_000_000_000_000_000u128, 2_020_000_000_000u128, 1),
        );

        let monitor = PriceMonitor::new(
            vec![pool_x.clone(), pool_y.clone()],
            transport,
            MonitorConfig { use_multicall: false, delta_threshold_percent: 0.5, ..MonitorConfig::default() },
        );

        struct Capture(std::sync::Mutex<Vec<crate::types::PriceDelta>>);
        #[async_trait::async_trait]
        impl MonitorObserver for Capture {
            async fn on_opportunity(&self, delta: &crate::types::PriceDelta) {
                self.0.lock().unwrap().push(delta.clone());
            }
        }
        let capture = Arc::new(Capture(std::sync::Mutex::new(Vec::new())));
        monitor.subscribe(capture.clone());

        monitor.poll().await.unwrap();
        assert_eq!(capture.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_price_fails_below_min_weth_reserve() {
        let transport = Arc::new(MockTransport::new(1));
        let pool = v2_pool(1);
        transport.set_response(pool.address, [0x09, 0x02, 0xf1, 0xac], reserves_payload(1, 2_000_000_000_000u128, 1));
        let monitor = PriceMonitor::new(
            vec![pool.clone()],
            transport,
            MonitorConfig { weth_address: Some(weth()), min_reserve_weth: 10.0, ..MonitorConfig::default() },
        );
        let result = monitor.fetch_price(&pool).await;
        assert!(matches!(result, Err(DexarbError::LowLiquidity { .. })));
    }

    #[tokio::test]
    async fn stale_is_emitted_after_max_retries_consecutive_errors() {
        let transport = Arc::new(MockTransport::new(1));
        let pool = v2_pool(1);
        transport.set_error(pool.address, [0x09, 0x02, 0xf1, 0xac], "boom");
        let monitor = PriceMonitor::new(
            vec![pool.clone()],
            transport,
            MonitorConfig { use_multicall: false, max_retries: 2, ..MonitorConfig::default() },
        );

        struct Capture(std::sync::Mutex<Vec<Address>>);
        #[async_trait::async_trait]
        impl MonitorObserver for Capture {
            async fn on_stale(&self, pool: Address) {
                self.0.lock().unwrap().push(pool);
            }
        }
        let capture = Arc::new(Capture(std::sync::Mutex::new(Vec::new())));
        monitor.subscribe(capture.clone());

        monitor.poll().await.unwrap();
        assert!(capture.0.lock().unwrap().is_empty());
        monitor.poll().await.unwrap();
        assert_eq!(capture.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn multicall_failure_falls_back_to_individual_calls() {
        let transport = Arc::new(MockTransport::new(1));
        let pool = v2_pool(1);
        // No response configured for Multicall3 itself -> transport errors on
        // the batch call, triggering fallback to per-pool fetches.
        transport.set_response(
            pool.address,
            [0x09, 0x02, 0xf1, 0xac],
            reserves_payload(1000_000_000_000_000_000_000u128, 2_000_000_000_000u128, 1),
        );
        let monitor = PriceMonitor::new(vec![pool.clone()], transport, MonitorConfig { use_multicall: true, ..MonitorConfig::default() });
        monitor.poll().await.unwrap();
        assert!(monitor.snapshot(&pool.lowercased_address()).is_some());
    }
}
