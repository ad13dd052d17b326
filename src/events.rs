//! Typed event surface (component E/J emissions, §6, §9).
//!
//! The port deliberately avoids a string-keyed dispatcher: subscribers
//! implement a small observer trait with one typed method per event kind,
//! and the detector attaches by holding a reference to the monitor's
//! observer list — matching the design-notes guidance in preference to
//! re-implementing the teacher's dynamic event-emitter pattern.

use crate::error::DexarbError;
use crate::types::{ArbitrageOpportunity, PriceDelta, PriceSnapshot};
use alloy::primitives::Address;
use async_trait::async_trait;

/// Subscriber to the price monitor's event stream. Default methods are
/// no-ops so an observer only needs to implement what it cares about.
#[async_trait]
pub trait MonitorObserver: Send + Sync {
    async fn on_price_update(&self, _snapshot: &PriceSnapshot) {}
    async fn on_error(&self, _pool: Address, _err: &DexarbError) {}
    async fn on_stale(&self, _pool: Address) {}
    async fn on_opportunity(&self, _delta: &PriceDelta) {}
}

/// Subscriber to the detector's event stream.
#[async_trait]
pub trait DetectorObserver: Send + Sync {
    async fn on_opportunity_found(&self, _opportunity: &ArbitrageOpportunity) {}
    async fn on_opportunity_rejected(&self, _reason: &str, _delta: &PriceDelta) {}
    async fn on_error(&self, _err: &DexarbError) {}
}
