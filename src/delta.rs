//! Delta grouping (component F): group fresh snapshots by canonical pair
//! key, compare the min- and max-priced pool in each group, and emit one
//! `PriceDelta` per pair per cycle when the spread clears the threshold.

use crate::types::{PriceDelta, PriceSnapshot};
use std::collections::HashMap;
use tracing::debug;

/// Groups `fresh` by canonical pair key and emits one delta per group
/// whose spread is `>= threshold_percent`. Only the min/max pair is ever
/// paired — intermediate pools in a >2-pool group are not compared to
/// each other (§4.F, §9 open question c).
///
/// `PriceSnapshot::price` is guaranteed `> 0` by construction
/// (`PriceSnapshot::new` refuses non-positive prices), so the spec's
/// "skip if min.price == 0" edge case can never be reached here.
pub fn group_and_emit(fresh: &[PriceSnapshot], threshold_percent: f64, now_ms: u64) -> Vec<PriceDelta> {
    let mut groups: HashMap<String, Vec<&PriceSnapshot>> = HashMap::new();
    for snap in fresh {
        groups.entry(snap.pair_key()).or_default().push(snap);
    }

    let mut deltas = Vec::new();
    for (pair_key, pools) in groups {
        if pools.len() < 2 {
            debug!(pair = %pair_key, pools = pools.len(), "pair has < 2 fresh pools, skipping");
            continue;
        }

        let mut min = pools[0];
        let mut max = pools[0];
        for p in pools.iter().skip(1) {
            if p.price < min.price {
                min = p;
            }
            if p.price > max.price {
                max = p;
            }
        }

        if min.pool.address == max.pool.address {
            // Every snapshot in the group priced identically — no spread.
            continue;
        }

        let delta_percent = (max.price - min.price) / min.price * 100.0;
        if delta_percent >= threshold_percent {
            deltas.push(PriceDelta {
                pair_key,
                buy_pool: min.clone(),
                sell_pool: max.clone(),
                delta_percent,
                timestamp_ms: now_ms,
            });
        } else {
            debug!(pair = %pair_key, delta_percent, threshold_percent, "spread below threshold");
        }
    }
    deltas
}
