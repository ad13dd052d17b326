//! Path builder (component G): construct the two-hop swap path from a
//! delta, or an explicit three-hop path from three caller-supplied
//! snapshots. Neither builder discovers cycles — the three-hop form
//! materializes a triangle the caller has already identified (§4.G).

use crate::price_math::{u256_to_f64, TWO_POW_96};
use crate::types::{PoolConfig, PriceDelta, PriceSnapshot, SwapPath, SwapStep};
use alloy::primitives::Address;

/// Buy `token0` on the cheaper pool (`buy_pool`), sell `token0` on the
/// pricier pool (`sell_pool`). The base token is `buy_pool`'s `token1`.
pub fn build_two_hop(delta: &PriceDelta) -> SwapPath {
    let base_token = delta.buy_pool.pool.token1;
    let counterpart = delta.buy_pool.pool.token0;

    let buy_step = build_step(&delta.buy_pool, base_token, counterpart);
    let sell_step = build_step(&delta.sell_pool, counterpart, base_token);

    SwapPath {
        steps: vec![buy_step, sell_step],
        base_token,
    }
}

/// Explicit three-hop path anchored on `token_a`: `a -> b -> c -> a`.
/// `pool_ab`/`pool_bc`/`pool_ca` are snapshots of the three pools the
/// caller has already determined quote those respective pairs.
pub fn build_three_hop(
    token_a: Address,
    token_b: Address,
    token_c: Address,
    pool_ab: &PriceSnapshot,
    pool_bc: &PriceSnapshot,
    pool_ca: &PriceSnapshot,
) -> SwapPath {
    SwapPath {
        steps: vec![
            build_step(pool_ab, token_a, token_b),
            build_step(pool_bc, token_b, token_c),
            build_step(pool_ca, token_c, token_a),
        ],
        base_token: token_a,
    }
}

fn build_step(snapshot: &PriceSnapshot, token_in: Address, token_out: Address) -> SwapStep {
    let pool = &snapshot.pool;
    let in_is_token0 = pool.token0 == token_in;

    let (decimals_in, decimals_out) = if in_is_token0 {
        (pool.token0_decimals, pool.token1_decimals)
    } else {
        (pool.token1_decimals, pool.token0_decimals)
    };

    // `price` is token1-per-token0 (output-per-input when input is
    // token0); when the input side is token1, the output-per-input rate
    // is the inverse.
    let expected_price = if in_is_token0 { snapshot.price } else { snapshot.inverse_price };

    SwapStep {
        variant: pool.variant,
        pool_address: pool.address,
        token_in,
        token_out,
        decimals_in,
        decimals_out,
        expected_price,
        fee_tier: pool.fee_tier,
        virtual_reserve_in: virtual_reserve_in(snapshot, in_is_token0),
    }
}

/// Decimal-adjusted reserve on the input side of a leg, used by the
/// pool-aware slippage model (component H). `None` when neither raw
/// reserves (v2) nor liquidity+sqrt-price (v3-family) are available.
fn virtual_reserve_in(snapshot: &PriceSnapshot, in_is_token0: bool) -> Option<f64> {
    let pool = &snapshot.pool;

    if let Some(reserves) = snapshot.reserves {
        let (raw, decimals) = if in_is_token0 {
            (reserves[0], pool.token0_decimals)
        } else {
            (reserves[1], pool.token1_decimals)
        };
        return Some(u256_to_f64(raw) / 10f64.powi(decimals as i32));
    }

    if let (Some(liquidity), Some(sqrt_price_x96)) = (snapshot.liquidity, snapshot.sqrt_price_x96) {
        if sqrt_price_x96.is_zero() || liquidity == 0 {
            return None;
        }
        // Full-range approximation: x = L / sqrtP, y = L * sqrtP. Concentrated
        // liquidity makes this an overestimate of the tradable depth at the
        // current tick, which is conservative for a slippage input.
        let sqrt_p = u256_to_f64(sqrt_price_x96) / TWO_POW_96;
        let l = liquidity as f64;
        let (raw, decimals) = if in_is_token0 {
            (l / sqrt_p, pool.token0_decimals)
        } else {
            (l * sqrt_p, pool.token1_decimals)
        };
        if !raw.is_finite() {
            return None;
        }
        return Some(raw / 10f64.powi(decimals as i32));
    }

    None
}
