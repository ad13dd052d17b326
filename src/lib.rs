//! On-chain DEX arbitrage opportunity detector core.
//!
//! Polls a configured set of liquidity pools, derives normalized
//! mid-prices across four pool shapes, groups same-pair pools to find
//! spreads, and turns each spread into a fully-costed, net-profitable
//! `ArbitrageOpportunity` — or rejects it with a typed reason. Execution,
//! key management, and on-chain submission are external collaborators;
//! this crate only detects.

pub mod cache;
pub mod codec;
pub mod config;
pub mod cost;
pub mod delta;
pub mod detector;
pub mod error;
pub mod events;
pub mod gas;
pub mod monitor;
pub mod optimizer;
pub mod path;
pub mod price_math;
pub mod transport;
pub mod types;

pub use config::{load_config, AppConfig};
pub use detector::OpportunityDetector;
pub use error::DexarbError;
pub use events::{DetectorObserver, MonitorObserver};
pub use monitor::PriceMonitor;
pub use types::{ArbitrageOpportunity, PoolConfig, PriceDelta, PriceSnapshot, ProtocolVariant};
