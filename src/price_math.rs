//! Price math for the four supported pool shapes (component B).
//!
//! All four functions are deterministic and total over their documented
//! domain. None compute a big on-chain integer squared — the division by
//! `2^96` (or the bin-step exponent) happens before any squaring/exp, per
//! the port's overflow-avoidance rule for `sqrtPriceX96` up to 2^160.

use alloy::primitives::U256;

/// `2^23`, the Liquidity Book bin-index anchor.
pub const LB_PRICE_ANCHOR: i64 = 1 << 23;

/// Uniswap-v2-style constant product: `price = (r1/10^d1) / (r0/10^d0)`.
/// Returns 0.0 when `r0 == 0` — the caller must not emit a snapshot for
/// that result.
pub fn v2_price(r0: U256, r1: U256, decimals0: u8, decimals1: u8) -> f64 {
    if r0.is_zero() {
        return 0.0;
    }
    let r0f = u256_to_f64(r0) / 10f64.powi(decimals0 as i32);
    let r1f = u256_to_f64(r1) / 10f64.powi(decimals1 as i32);
    r1f / r0f
}

/// Uniswap-v3 / Algebra price from `sqrtPriceX96`.
///
/// `raw = (sqrtPriceX96 / 2^96)^2`, `price = raw * 10^(d0-d1)`. The
/// division by `2^96` is performed in f64 before squaring so the result
/// stays finite for `sqrtPriceX96` up to 2^160 — squaring the raw integer
/// first would overflow any fixed-width type long before that.
pub fn v3_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    let sqrt_p = u256_to_f64(sqrt_price_x96) / TWO_POW_96;
    let raw = sqrt_p * sqrt_p;
    raw * 10f64.powi(decimals0 as i32 - decimals1 as i32)
}

pub(crate) const TWO_POW_96: f64 = 79_228_162_514_264_337_593_543_950_336.0; // 2^96

/// Trader-Joe Liquidity Book bin price.
///
/// `r = 1 + binStep/10000`, `price = r^(activeId - 2^23) * 10^(d0-d1)`,
/// computed as `exp((activeId - anchor) * ln(r))` so the result stays
/// finite across the full 24-bit `activeId` range. `invert` mirrors
/// `PoolConfig.invert_price` and is applied once, at the end.
pub fn lb_price(active_id: u32, bin_step: u32, decimals0: u8, decimals1: u8, invert: bool) -> f64 {
    let r = 1.0 + (bin_step as f64) / 10_000.0;
    let exponent = active_id as i64 - LB_PRICE_ANCHOR;
    let price = (exponent as f64 * r.ln()).exp() * 10f64.powi(decimals0 as i32 - decimals1 as i32);
    if invert {
        inverse_price(price)
    } else {
        price
    }
}

/// `1/price`, guarded against division by zero (and non-finite inputs).
pub fn inverse_price(price: f64) -> f64 {
    if price > 0.0 && price.is_finite() {
        1.0 / price
    } else {
        0.0
    }
}

/// Converts a `U256` to `f64` losslessly enough for price math (full
/// mantissa precision is not needed — only the final ratio is).
pub(crate) fn u256_to_f64(x: U256) -> f64 {
    // U256's Display/to-string path is exact; parsing back into f64 avoids
    // hand-rolled limb arithmetic while still never truncating the value
    // before scaling (unlike casting through u128, which would wrap for
    // values above 2^128, e.g. sqrtPriceX96 near its 2^160 domain edge).
    x.to_string().parse::<f64>().unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_price_matches_scenario_1() {
        // WETH(18)/USDC(6), reserves (1000e18, 2_000_000e6) -> price 2000
        let r0 = U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u64));
        let r1 = U256::from(2_000_000u64) * U256::from(10u64).pow(U256::from(6u64));
        let p = v2_price(r0, r1, 18, 6);
        assert!((p - 2000.0).abs() < 1e-6, "got {p}");
    }

    #[test]
    fn v2_price_zero_reserve_is_zero() {
        assert_eq!(v2_price(U256::ZERO, U256::from(1u64), 18, 18), 0.0);
    }

    #[test]
    fn v2_price_equal_decimals_is_unscaled_ratio() {
        let p = v2_price(U256::from(100u64), U256::from(250u64), 18, 18);
        assert!((p - 2.5).abs() < 1e-12);
    }

    #[test]
    fn v3_price_is_positive_and_finite_near_domain_edge() {
        // sqrtPriceX96 near 2^160 must not overflow when squared.
        let near_max = U256::from(1u64) << 159;
        let p = v3_price(near_max, 18, 18);
        assert!(p.is_finite());
        assert!(p > 0.0);
    }

    #[test]
    fn v3_price_decimal_adjustment() {
        // sqrtPriceX96 = 2^96 means raw ratio == 1.0
        let sqrt_p = U256::from(1u64) << 96;
        let p = v3_price(sqrt_p, 18, 6);
        assert!((p - 1e12).abs() / 1e12 < 1e-9, "got {p}");
    }

    #[test]
    fn lb_price_is_finite_across_active_id_range() {
        for active_id in [0u32, 1, 1 << 23, (1 << 24) - 1] {
            let p = lb_price(active_id, 15, 18, 18, false);
            assert!(p.is_finite() && p > 0.0, "active_id={active_id} price={p}");
        }
    }

    #[test]
    fn lb_price_anchor_is_unity() {
        let p = lb_price(LB_PRICE_ANCHOR as u32, 15, 18, 18, false);
        assert!((p - 1.0).abs() < 1e-9, "got {p}");
    }

    #[test]
    fn lb_price_invert_is_reciprocal() {
        let p = lb_price(1000, 25, 18, 18, false);
        let inv = lb_price(1000, 25, 18, 18, true);
        assert!((p * inv - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_price_guards_zero() {
        assert_eq!(inverse_price(0.0), 0.0);
        assert!((inverse_price(4.0) - 0.25).abs() < 1e-12);
    }
}
