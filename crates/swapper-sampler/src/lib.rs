//! Liquidity sampling for the asset swapper.
//!
//! This crate reads prices from every configured source. On-chain sources are
//! sampled through a single `batchCall` to the sampler contract, Balancer
//! pools may be sampled off chain from cached pool state, and RFQ makers are
//! asked for firm or indicative quotes over HTTP.

use alloy_primitives::Bytes;
use async_trait::async_trait;
use swapper_types::ConfigSchema;
use thiserror::Error;

mod abi;
pub mod amounts;
pub mod rfq;
pub mod sampler;
pub mod sources;

pub use amounts::get_sample_amounts;
pub use rfq::{
	HttpRfqTransport, QuoteRequestor, RfqConfig, RfqFirmQuote, RfqIndicativeQuote, RfqRequestOpts,
	RfqTransport,
};
pub use sampler::{BatchOperation, BatchResult, DexOrderSampler, DexQuery, TwoHopQuery};
pub use sources::{LiquidityProviderConfig, SourcesConfig, TokenAdjacencyGraph, UniswapV3Addresses};

/// Re-export implementations
pub mod implementations {
	pub mod rpc;
}

/// Errors that can occur while sampling.
#[derive(Debug, Error)]
pub enum SamplerError {
	/// The request never reached the node or got no answer.
	#[error("Transport error: {0}")]
	Transport(String),
	/// The node answered with a JSON-RPC error.
	#[error("RPC error: {0}")]
	Rpc(String),
	/// The answer could not be decoded.
	#[error("Decode error: {0}")]
	Decode(String),
	/// The backend configuration is unusable.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Outcome of one sub-call of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
	pub data: Bytes,
	pub success: bool,
}

/// Executes batches of sampler sub-calls.
#[async_trait]
pub trait SamplerInterface: Send + Sync {
	/// Returns the configuration schema for this backend.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Runs every call in one round trip. Results are index-aligned with `calls`.
	async fn batch_call(&self, calls: Vec<Bytes>) -> Result<Vec<CallResult>, SamplerError>;
}
