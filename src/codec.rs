//! Call-data codec (component C): encode/decode the ABI shapes the
//! monitor needs, bit-exact, plus Multicall3 `aggregate3` batching.
//!
//! Mirrors the teacher's use of `alloy::sol!` for interface definitions
//! (`contracts.rs`) but without `#[sol(rpc)]` — the core never holds a
//! `Provider` directly, only the `RpcTransport` trait (see
//! `transport.rs`), so calldata is built and returned bytes decoded by
//! hand at this layer.

use crate::error::DexarbError;
use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

/// Multicall3 is deployed at this address on every EVM chain this bot
/// targets.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

sol! {
    interface IUniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
    }
}

sol! {
    interface IAlgebraPool {
        function globalState() external view returns (uint160 price, int24 tick, uint16 fee, uint16 timepointIndex, uint16 communityFeeToken0, uint8 communityFeeToken1, uint8 unlocked);
        function liquidity() external view returns (uint128);
    }
}

sol! {
    interface ILbPair {
        function getActiveId() external view returns (uint24 activeId);
    }
}

sol! {
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Result3 {
        bool success;
        bytes returnData;
    }

    interface IMulticall3 {
        function aggregate3(Call3[] calldata calls) external payable returns (Result3[] memory returnData);
    }
}

/// Decoded `getReserves()` return.
#[derive(Debug, Clone, Copy)]
pub struct Reserves {
    pub reserve0: U256,
    pub reserve1: U256,
    pub block_timestamp_last: u32,
}

/// Decoded `slot0()` / `globalState()` return, unified — both carry a
/// sqrt-price-style value, a tick, and a fee, which is all price_math and
/// the monitor need.
#[derive(Debug, Clone, Copy)]
pub struct V3Slot {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub fee: u32,
}

pub fn encode_get_reserves() -> Bytes {
    Bytes::from(IUniswapV2Pair::getReservesCall {}.abi_encode())
}

pub fn decode_get_reserves(data: &[u8]) -> Result<Reserves, DexarbError> {
    let ret = IUniswapV2Pair::getReservesCall::abi_decode_returns(data)
        .map_err(|e| decode_err("getReserves", e))?;
    Ok(Reserves {
        reserve0: U256::from(ret.reserve0),
        reserve1: U256::from(ret.reserve1),
        block_timestamp_last: ret.blockTimestampLast,
    })
}

pub fn encode_slot0() -> Bytes {
    Bytes::from(IUniswapV3Pool::slot0Call {}.abi_encode())
}

pub fn decode_slot0(data: &[u8]) -> Result<V3Slot, DexarbError> {
    let ret = IUniswapV3Pool::slot0Call::abi_decode_returns(data)
        .map_err(|e| decode_err("slot0", e))?;
    Ok(V3Slot {
        sqrt_price_x96: U256::from(ret.sqrtPriceX96),
        tick: ret.tick.as_i32(),
        fee: 0, // v3 fee tier is static config, not part of slot0
    })
}

pub fn encode_global_state() -> Bytes {
    Bytes::from(IAlgebraPool::globalStateCall {}.abi_encode())
}

pub fn decode_global_state(data: &[u8]) -> Result<V3Slot, DexarbError> {
    let ret = IAlgebraPool::globalStateCall::abi_decode_returns(data)
        .map_err(|e| decode_err("globalState", e))?;
    Ok(V3Slot {
        sqrt_price_x96: U256::from(ret.price),
        tick: ret.tick.as_i32(),
        fee: ret.fee as u32,
    })
}

pub fn encode_liquidity() -> Bytes {
    Bytes::from(IUniswapV3Pool::liquidityCall {}.abi_encode())
}

pub fn decode_liquidity(data: &[u8]) -> Result<u128, DexarbError> {
    let ret = IUniswapV3Pool::liquidityCall::abi_decode_returns(data)
        .map_err(|e| decode_err("liquidity", e))?;
    Ok(ret)
}

pub fn encode_get_active_id() -> Bytes {
    Bytes::from(ILbPair::getActiveIdCall {}.abi_encode())
}

pub fn decode_get_active_id(data: &[u8]) -> Result<u32, DexarbError> {
    let ret = ILbPair::getActiveIdCall::abi_decode_returns(data)
        .map_err(|e| decode_err("getActiveId", e))?;
    Ok(ret.to::<u32>())
}

/// One sub-call in a Multicall3 `aggregate3` batch. Always constructed
/// with `allow_failure = true` so one bad pool never fails the batch.
#[derive(Debug, Clone)]
pub struct BatchCall {
    pub target: Address,
    pub call_data: Bytes,
}

pub fn encode_aggregate3(calls: &[BatchCall]) -> Bytes {
    let calls = calls
        .iter()
        .map(|c| Call3 {
            target: c.target,
            allowFailure: true,
            callData: c.call_data.clone(),
        })
        .collect();
    Bytes::from(IMulticall3::aggregate3Call { calls }.abi_encode())
}

/// One decoded sub-result: `(success, returnData)`, in request order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub success: bool,
    pub return_data: Bytes,
}

pub fn decode_aggregate3_result(data: &[u8]) -> Result<Vec<BatchResult>, DexarbError> {
    let ret = IMulticall3::aggregate3Call::abi_decode_returns(data)
        .map_err(|e| decode_err("aggregate3", e))?;
    Ok(ret
        .into_iter()
        .map(|r| BatchResult {
            success: r.success,
            return_data: r.returnData,
        })
        .collect())
}

fn decode_err(what: &str, e: alloy::sol_types::Error) -> DexarbError {
    DexarbError::DecodeFailure {
        pool: Address::ZERO,
        reason: format!("{what}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reserves_selector_matches_spec() {
        let data = encode_get_reserves();
        assert_eq!(&data[..4], &[0x09, 0x02, 0xf1, 0xac]);
    }

    #[test]
    fn slot0_selector_matches_spec() {
        let data = encode_slot0();
        assert_eq!(&data[..4], &[0x38, 0x50, 0xc7, 0xbd]);
    }

    #[test]
    fn global_state_selector_matches_spec() {
        let data = encode_global_state();
        assert_eq!(&data[..4], &[0xe7, 0x6c, 0x01, 0xe4]);
    }

    #[test]
    fn get_reserves_round_trips() {
        use alloy::sol_types::SolValue;
        let encoded = (112u128, 998u128, 123u32).abi_encode_sequence();
        let decoded = decode_get_reserves(&encoded).unwrap();
        assert_eq!(decoded.reserve0, U256::from(112u128));
        assert_eq!(decoded.reserve1, U256::from(998u128));
        assert_eq!(decoded.block_timestamp_last, 123);
    }

    #[test]
    fn aggregate3_batch_round_trips() {
        let calls = vec![
            BatchCall { target: MULTICALL3_ADDRESS, call_data: encode_get_reserves() },
            BatchCall { target: MULTICALL3_ADDRESS, call_data: encode_slot0() },
        ];
        let encoded = encode_aggregate3(&calls);
        // aggregate3's selector is whatever keccak gives this exact
        // signature; we only assert that it's stable and non-empty.
        assert!(encoded.len() > 4);
    }
}
