//! Pool discovery and caching for AMMs whose pools are not known statically.
//!
//! A [`PoolsCache`] keeps, per token pair, the pools a fetcher last reported.
//! It is seeded in the background from the fetcher's top pools and filled in
//! the foreground for pairs it has not seen, and it tells the sampler whether
//! a pair should be sampled on chain, off chain or not at all.

use alloy_primitives::Address;
use async_trait::async_trait;
use swapper_types::{ConfigSchema, Pool};
use thiserror::Error;

pub mod balancer_math;
pub mod cache;

pub use cache::{PoolsCache, PoolsCacheConfig, SamplingStrategy};

/// Re-export implementations
pub mod implementations {
	pub mod subgraph;
}

/// Errors that can occur while fetching pools.
#[derive(Debug, Error)]
pub enum PoolCacheError {
	/// The request to the pool source failed.
	#[error("HTTP error: {0}")]
	Http(String),
	/// The pool source answered with something that could not be interpreted.
	#[error("Malformed response: {0}")]
	MalformedResponse(String),
}

/// Source of pool descriptions.
#[async_trait]
pub trait PoolFetcherInterface: Send + Sync {
	/// Returns the configuration schema for this fetcher.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fetches the most used pools across all pairs.
	async fn fetch_top_pools(&self) -> Result<Vec<Pool>, PoolCacheError>;

	/// Fetches the pools that trade `taker_token` against `maker_token`.
	async fn fetch_pools_for_pair(
		&self,
		taker_token: Address,
		maker_token: Address,
	) -> Result<Vec<Pool>, PoolCacheError>;
}

/// Time source for cache freshness checks.
pub trait Clock: Send + Sync {
	/// Milliseconds since the unix epoch.
	fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> u64 {
		chrono::Utc::now().timestamp_millis().max(0) as u64
	}
}
