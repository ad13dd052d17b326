//! Input optimizer (component I): ternary search over a unimodal
//! net-profit curve, with wall-clock timeout, convergence threshold, and
//! a max-iteration cap, tracking the best point seen so early
//! termination still returns a safe answer (§4.I).

use crate::types::OptimizationResult;
use std::time::{Duration, Instant};

/// `profit_fn` must be (at least approximately) unimodal over
/// `[min_amount, min(max_amount, max_amount_override)]` — true for the
/// cost model's `gross_profit - total_cost` curve, which rises then falls
/// as slippage overtakes gross profit.
pub fn optimize<F>(
    profit_fn: F,
    min_amount: f64,
    max_amount: f64,
    max_amount_override: Option<f64>,
    config: crate::types::OptimizerConfig,
) -> OptimizationResult
where
    F: Fn(f64) -> f64,
{
    let upper = max_amount_override.map(|o| max_amount.min(o)).unwrap_or(max_amount);
    let mut left = min_amount;
    let mut right = upper.max(min_amount);

    let started = Instant::now();
    let timeout = Duration::from_millis(config.timeout_ms);

    let mut best_amount = left;
    let mut best_profit = profit_fn(left);
    let mut iterations = 0u32;

    loop {
        if started.elapsed() > timeout {
            return OptimizationResult {
                optimal_amount: config.fallback_amount,
                expected_profit: profit_fn(config.fallback_amount),
                iterations,
                duration_ms: started.elapsed().as_millis() as u64,
                converged: false,
                fallback_reason: Some("timeout".to_string()),
            };
        }
        if right - left < config.convergence_threshold {
            return finish(best_amount, best_profit, iterations, started, true, None, &config);
        }
        if iterations >= config.max_iterations {
            return finish(
                best_amount,
                best_profit,
                iterations,
                started,
                false,
                Some("max_iterations".to_string()),
                &config,
            );
        }

        let third = (right - left) / 3.0;
        let m1 = left + third;
        let m2 = right - third;
        let p1 = profit_fn(m1);
        let p2 = profit_fn(m2);

        for (amount, profit) in [(m1, p1), (m2, p2)] {
            if profit > best_profit {
                best_profit = profit;
                best_amount = amount;
            }
        }

        if p1 < p2 {
            left = m1;
        } else {
            right = m2;
        }
        iterations += 1;
    }
}

fn finish(
    best_amount: f64,
    best_profit: f64,
    iterations: u32,
    started: Instant,
    converged: bool,
    fallback_reason: Option<String>,
    config: &crate::types::OptimizerConfig,
) -> OptimizationResult {
    let duration_ms = started.elapsed().as_millis() as u64;
    if best_profit <= 0.0 {
        return OptimizationResult {
            optimal_amount: config.fallback_amount,
            expected_profit: best_profit,
            iterations,
            duration_ms,
            converged,
            fallback_reason: Some("no_profitable_size".to_string()),
        };
    }
    OptimizationResult {
        optimal_amount: best_amount,
        expected_profit: best_profit,
        iterations,
        duration_ms,
        converged,
        fallback_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptimizerConfig;

    fn config() -> OptimizerConfig {
        OptimizerConfig {
            max_iterations: 50,
            timeout_ms: 5_000,
            fallback_amount: 10.0,
            min_amount: 1.0,
            max_amount: 1000.0,
            convergence_threshold: 0.01,
        }
    }

    #[test]
    fn converges_on_a_concave_profit_curve() {
        // peak at x = 100
        let profit_fn = |x: f64| -((x - 100.0).powi(2)) + 50.0;
        let result = optimize(profit_fn, 1.0, 1000.0, None, config());
        assert!(result.converged);
        assert!((result.optimal_amount - 100.0).abs() < 1.0, "got {}", result.optimal_amount);
        assert!(result.expected_profit > 0.0);
    }

    #[test]
    fn max_amount_override_bounds_the_search() {
        let profit_fn = |x: f64| x; // monotonically increasing, peak at the upper bound
        let result = optimize(profit_fn, 1.0, 1000.0, Some(50.0), config());
        assert!(result.optimal_amount <= 50.0 + 1.0);
    }

    #[test]
    fn all_negative_profit_falls_back() {
        let profit_fn = |_x: f64| -1.0;
        let result = optimize(profit_fn, 1.0, 1000.0, None, config());
        assert_eq!(result.optimal_amount, 10.0);
        assert_eq!(result.fallback_reason.as_deref(), Some("no_profitable_size"));
    }

    #[test]
    fn max_iterations_reached_returns_best_seen() {
        let profit_fn = |x: f64| -((x - 100.0).powi(2)) + 50.0;
        let mut cfg = config();
        cfg.max_iterations = 1;
        cfg.convergence_threshold = 0.0; // never converge on its own
        let result = optimize(profit_fn, 1.0, 1000.0, None, cfg);
        assert!(!result.converged);
        assert_eq!(result.fallback_reason.as_deref(), Some("max_iterations"));
        assert!(result.expected_profit > 0.0);
    }

    #[test]
    fn zero_timeout_returns_fallback_immediately() {
        let profit_fn = |x: f64| -((x - 100.0).powi(2)) + 50.0;
        let mut cfg = config();
        cfg.timeout_ms = 0;
        let result = optimize(profit_fn, 1.0, 1000.0, None, cfg);
        assert_eq!(result.optimal_amount, 10.0);
        assert_eq!(result.fallback_reason.as_deref(), Some("timeout"));
        assert!(!result.converged);
    }
}
