//! RPC transport abstraction (component A, consumed interface).
//!
//! The core never depends on a concrete `Provider` type — it depends on
//! this trait, matching the port guidance to expose a strongly-typed seam
//! instead of threading `alloy`'s `Middleware`/`Provider` generics through
//! every struct the way the teacher's `PoolSyncer<P>` does.

use crate::error::DexarbError;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;

/// An asynchronous EVM view-call transport. Implementations must never
/// retry internally — retry policy belongs to the monitor.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Latest block number.
    async fn block_number(&self) -> Result<u64, DexarbError>;

    /// An `eth_call` against `latest`, returning the raw ABI-encoded
    /// return bytes.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DexarbError>;
}

/// Default HTTP JSON-RPC transport, built on `alloy`'s HTTP provider —
/// the teacher's stack (Cargo.toml already depends on `alloy` with
/// `provider-http`/`reqwest-rustls-tls`).
pub mod http {
    use super::*;
    use alloy::eips::BlockId;
    use alloy::providers::{Provider, ProviderBuilder};
    use alloy::rpc::types::TransactionRequest;

    pub struct HttpTransport {
        provider: Box<dyn Provider + Send + Sync>,
    }

    impl HttpTransport {
        pub fn connect(rpc_url: &str) -> Result<Self, DexarbError> {
            let url = rpc_url
                .parse()
                .map_err(|e| DexarbError::config(format!("invalid RPC URL: {e}")))?;
            let provider = ProviderBuilder::new().connect_http(url);
            Ok(Self {
                provider: Box::new(provider),
            })
        }
    }

    #[async_trait]
    impl RpcTransport for HttpTransport {
        async fn block_number(&self) -> Result<u64, DexarbError> {
            self.provider.get_block_number().await.map_err(|e| DexarbError::TransportFailure {
                pool: Address::ZERO,
                source: anyhow::anyhow!(e),
            })
        }

        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DexarbError> {
            let tx = TransactionRequest::default().to(to).input(data.into());
            self.provider
                .call(tx)
                .block(BlockId::latest())
                .await
                .map_err(|e| DexarbError::TransportFailure {
                    pool: to,
                    source: anyhow::anyhow!(e),
                })
        }
    }
}

#[cfg(test)]
pub mod test_support {
    //! A scriptable in-memory transport used throughout the unit and
    //! integration tests — no network, fully deterministic.

    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    pub struct MockTransport {
        pub block: AtomicU64,
        /// (to, first 4 selector bytes) -> response bytes or error.
        pub responses: DashMap<(Address, [u8; 4]), Result<Bytes, String>>,
    }

    impl MockTransport {
        pub fn new(block: u64) -> Self {
            Self {
                block: AtomicU64::new(block),
                responses: DashMap::new(),
            }
        }

        pub fn set_block(&self, block: u64) {
            self.block.store(block, Ordering::SeqCst);
        }

        pub fn set_response(&self, to: Address, selector: [u8; 4], data: Bytes) {
            self.responses.insert((to, selector), Ok(data));
        }

        pub fn set_error(&self, to: Address, selector: [u8; 4], msg: impl Into<String>) {
            self.responses.insert((to, selector), Err(msg.into()));
        }
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn block_number(&self) -> Result<u64, DexarbError> {
            Ok(self.block.load(Ordering::SeqCst))
        }

        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DexarbError> {
            let mut selector = [0u8; 4];
            if data.len() >= 4 {
                selector.copy_from_slice(&data[..4]);
            }
            match self.responses.get(&(to, selector)) {
                Some(entry) => match entry.value() {
                    Ok(bytes) => Ok(bytes.clone()),
                    Err(msg) => Err(DexarbError::TransportFailure {
                        pool: to,
                        source: anyhow::anyhow!(msg.clone()),
                    }),
                },
                None => Err(DexarbError::TransportFailure {
                    pool: to,
                    source: anyhow::anyhow!("no mock response configured for selector {selector:?}"),
                }),
            }
        }
    }
}
