//! Per-pair pool cache with background seeding and foreground fetches.

use alloy_primitives::Address;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swapper_types::{pair_key, Pool};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Clock, PoolFetcherInterface};

/// Tuning knobs of a [`PoolsCache`].
#[derive(Debug, Clone)]
pub struct PoolsCacheConfig {
	/// Lifetime of entries written by a foreground fetch.
	pub foreground_ttl_ms: u64,
	/// Lifetime of entries written by the background refresh.
	pub background_ttl_ms: u64,
	/// Pools kept per pair after a foreground fetch.
	pub max_pools_fetched: usize,
	/// Oldest entry the sampler trusts when deciding how to sample.
	pub sampling_max_age_ms: u64,
	/// Period of the background refresh.
	pub refresh_interval: Duration,
}

impl Default for PoolsCacheConfig {
	fn default() -> Self {
		Self {
			foreground_ttl_ms: 3_000,
			background_ttl_ms: 24 * 60 * 60 * 1000,
			max_pools_fetched: 3,
			sampling_max_age_ms: 60 * 60 * 1000,
			refresh_interval: Duration::from_secs(12 * 60 * 60),
		}
	}
}

/// A cached set of pools for one pair. Entries are replaced whole.
#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub pools: Vec<Pool>,
	pub timestamp_ms: u64,
	pub ttl_ms: u64,
}

impl CacheEntry {
	fn is_fresh(&self, now_ms: u64) -> bool {
		now_ms < self.timestamp_ms.saturating_add(self.ttl_ms)
	}
}

/// How a pair should be sampled. Never both on and off chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingStrategy {
	pub on_chain: bool,
	pub off_chain: bool,
}

/// Shared pool cache. Use it behind an `Arc`.
pub struct PoolsCache {
	fetcher: Box<dyn PoolFetcherInterface>,
	clock: Arc<dyn Clock>,
	config: PoolsCacheConfig,
	entries: DashMap<String, Arc<CacheEntry>>,
}

impl PoolsCache {
	pub fn new(
		fetcher: Box<dyn PoolFetcherInterface>,
		clock: Arc<dyn Clock>,
		config: PoolsCacheConfig,
	) -> Self {
		Self {
			fetcher,
			clock,
			config,
			entries: DashMap::new(),
		}
	}

	pub fn config(&self) -> &PoolsCacheConfig {
		&self.config
	}

	fn entry(&self, taker_token: Address, maker_token: Address) -> Option<Arc<CacheEntry>> {
		self.entries
			.get(&pair_key(taker_token, maker_token))
			.map(|e| Arc::clone(e.value()))
	}

	fn store(&self, taker_token: Address, maker_token: Address, pools: Vec<Pool>, ttl_ms: u64) {
		let entry = CacheEntry {
			pools,
			timestamp_ms: self.clock.now_ms(),
			ttl_ms,
		};
		self.entries
			.insert(pair_key(taker_token, maker_token), Arc::new(entry));
	}

	/// Returns the pools for a pair, fetching them if the entry is missing or stale.
	///
	/// The lookup races against `timeout` and resolves to an empty list if it
	/// loses. A fetch that outlives the timeout keeps running and still caches
	/// its result. This never fails.
	pub async fn get_pools_for_pair(
		self: &Arc<Self>,
		taker_token: Address,
		maker_token: Address,
		timeout: Duration,
	) -> Vec<Pool> {
		let this = Arc::clone(self);
		let lookup =
			tokio::spawn(async move { this.fetch_or_serve(taker_token, maker_token).await });

		match tokio::time::timeout(timeout, lookup).await {
			Ok(Ok(pools)) => pools,
			Ok(Err(e)) => {
				warn!(error = %e, "Pool lookup task failed");
				Vec::new()
			}
			Err(_) => {
				debug!(%taker_token, %maker_token, "Pool lookup timed out");
				Vec::new()
			}
		}
	}

	async fn fetch_or_serve(&self, taker_token: Address, maker_token: Address) -> Vec<Pool> {
		if let Some(entry) = self.entry(taker_token, maker_token) {
			if entry.is_fresh(self.clock.now_ms()) {
				return entry.pools.clone();
			}
		}

		let pools = match self
			.fetcher
			.fetch_pools_for_pair(taker_token, maker_token)
			.await
		{
			Ok(mut pools) => {
				let balance_out =
					|p: &Pool| p.token(maker_token).map(|t| t.balance).unwrap_or_default();
				pools.retain(|p| p.contains_pair(taker_token, maker_token));
				pools.sort_by_key(|p| std::cmp::Reverse(balance_out(p)));
				pools.truncate(self.config.max_pools_fetched);
				pools
			}
			Err(e) => {
				warn!(%taker_token, %maker_token, error = %e, "Failed to fetch pools for pair");
				Vec::new()
			}
		};

		self.store(
			taker_token,
			maker_token,
			pools.clone(),
			self.config.foreground_ttl_ms,
		);
		pools
	}

	/// Addresses of the cached pools for a pair.
	///
	/// With `max_age_ms`, returns `None` when the pair is unknown or its entry
	/// is older than that. Without it, an unknown pair yields an empty list.
	pub fn get_cached_pool_addresses_for_pair(
		&self,
		taker_token: Address,
		maker_token: Address,
		max_age_ms: Option<u64>,
	) -> Option<Vec<Address>> {
		let entry = self.entry(taker_token, maker_token);
		match (entry, max_age_ms) {
			(None, Some(_)) => None,
			(None, None) => Some(Vec::new()),
			(Some(entry), Some(max_age)) => {
				let age = self.clock.now_ms().saturating_sub(entry.timestamp_ms);
				(age <= max_age).then(|| entry.pools.iter().map(|p| p.id).collect())
			}
			(Some(entry), None) => Some(entry.pools.iter().map(|p| p.id).collect()),
		}
	}

	/// True when the pair has an entry that has not outlived its ttl.
	pub fn is_fresh(&self, taker_token: Address, maker_token: Address) -> bool {
		self.entry(taker_token, maker_token)
			.is_some_and(|e| e.is_fresh(self.clock.now_ms()))
	}

	/// Decides whether a pair is sampled against known pools on chain, or
	/// needs pool discovery and off-chain math.
	pub fn how_to_sample(
		&self,
		taker_token: Address,
		maker_token: Address,
		is_allowed_source: bool,
	) -> SamplingStrategy {
		if !is_allowed_source {
			return SamplingStrategy::default();
		}
		match self.get_cached_pool_addresses_for_pair(
			taker_token,
			maker_token,
			Some(self.config.sampling_max_age_ms),
		) {
			None => SamplingStrategy {
				on_chain: false,
				off_chain: true,
			},
			Some(addresses) => SamplingStrategy {
				on_chain: !addresses.is_empty(),
				off_chain: false,
			},
		}
	}

	/// Fetches the top pools and seeds an entry for every pair they trade.
	///
	/// Returns the number of pairs written.
	pub async fn refresh_top_pools(&self) -> Result<usize, crate::PoolCacheError> {
		let top = self.fetcher.fetch_top_pools().await?;

		let mut by_pair: HashMap<String, (Address, Address, Vec<Pool>)> = HashMap::new();
		for pool in &top {
			for from in &pool.tokens {
				for to in pool.tokens.iter().filter(|t| t.address != from.address) {
					let slot = by_pair
						.entry(pair_key(from.address, to.address))
						.or_insert_with(|| (from.address, to.address, Vec::new()));
					if !slot.2.iter().any(|p| p.id == pool.id) {
						slot.2.push(pool.clone());
					}
				}
			}
		}

		let pairs = by_pair.len();
		for (_, (a, b, pools)) in by_pair {
			self.store(a, b, pools, self.config.background_ttl_ms);
		}
		info!(pools = top.len(), pairs, "Refreshed top pools");
		Ok(pairs)
	}

	/// Spawns the periodic background refresh. The first tick runs immediately.
	pub fn spawn_refresh(self: Arc<Self>) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(self.config.refresh_interval);
			loop {
				interval.tick().await;
				if let Err(e) = self.refresh_top_pools().await {
					warn!(error = %e, "Failed to refresh top pools");
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::PoolCacheError;
	use alloy_primitives::{address, U256};
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
	use swapper_types::{ConfigSchema, PoolToken, Schema, ValidationError};

	const DAI: Address = address!("6b175474e89094c44da98b954eedeac495271d0f");
	const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
	const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

	struct ManualClock(AtomicU64);

	impl Clock for ManualClock {
		fn now_ms(&self) -> u64 {
			self.0.load(Ordering::SeqCst)
		}
	}

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	struct StaticFetcher {
		pools: Vec<Pool>,
		calls: Arc<AtomicUsize>,
		delay: Duration,
		fail: bool,
	}

	#[async_trait]
	impl PoolFetcherInterface for StaticFetcher {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn fetch_top_pools(&self) -> Result<Vec<Pool>, PoolCacheError> {
			Ok(self.pools.clone())
		}

		async fn fetch_pools_for_pair(
			&self,
			_taker_token: Address,
			_maker_token: Address,
		) -> Result<Vec<Pool>, PoolCacheError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(self.delay).await;
			if self.fail {
				return Err(PoolCacheError::Http("boom".into()));
			}
			Ok(self.pools.clone())
		}
	}

	fn pool(id: u8, tokens: &[(Address, u64)]) -> Pool {
		Pool {
			id: Address::repeat_byte(id),
			swap_fee: U256::from(3_000_000_000_000_000u64),
			tokens: tokens
				.iter()
				.map(|(address, balance)| PoolToken {
					address: *address,
					balance: U256::from(*balance),
					decimals: 18,
					weight: U256::from(1_000_000_000_000_000_000u64),
				})
				.collect(),
		}
	}

	fn cache(fetcher: StaticFetcher, clock: Arc<ManualClock>) -> Arc<PoolsCache> {
		Arc::new(PoolsCache::new(
			Box::new(fetcher),
			clock,
			PoolsCacheConfig {
				foreground_ttl_ms: 1_000,
				background_ttl_ms: 100_000,
				max_pools_fetched: 2,
				sampling_max_age_ms: 10_000,
				refresh_interval: Duration::from_secs(3600),
			},
		))
	}

	fn fetcher(pools: Vec<Pool>) -> (StaticFetcher, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		(
			StaticFetcher {
				pools,
				calls: calls.clone(),
				delay: Duration::ZERO,
				fail: false,
			},
			calls,
		)
	}

	#[tokio::test]
	async fn test_staleness_semantics() {
		let clock = Arc::new(ManualClock(AtomicU64::new(1_000)));
		let (fetcher, calls) = fetcher(vec![pool(1, &[(DAI, 10), (WETH, 5)])]);
		let cache = cache(fetcher, clock.clone());

		assert_eq!(
			cache.get_cached_pool_addresses_for_pair(DAI, WETH, Some(5_000)),
			None
		);
		assert_eq!(
			cache.get_cached_pool_addresses_for_pair(DAI, WETH, None),
			Some(vec![])
		);

		let pools = cache
			.get_pools_for_pair(DAI, WETH, Duration::from_secs(1))
			.await;
		assert_eq!(pools.len(), 1);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(cache.is_fresh(WETH, DAI));

		// Served from cache while fresh.
		cache
			.get_pools_for_pair(WETH, DAI, Duration::from_secs(1))
			.await;
		assert_eq!(calls.load(Ordering::SeqCst), 1);

		clock.0.store(1_000 + 5_001, Ordering::SeqCst);
		assert!(!cache.is_fresh(DAI, WETH));
		assert_eq!(
			cache.get_cached_pool_addresses_for_pair(DAI, WETH, Some(5_000)),
			None
		);
		assert_eq!(
			cache.get_cached_pool_addresses_for_pair(DAI, WETH, None),
			Some(vec![Address::repeat_byte(1)])
		);

		// Stale entries trigger a refetch.
		cache
			.get_pools_for_pair(DAI, WETH, Duration::from_secs(1))
			.await;
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_foreground_fetch_sorts_and_caps() {
		let clock = Arc::new(ManualClock(AtomicU64::new(0)));
		let (fetcher, _) = fetcher(vec![
			pool(1, &[(DAI, 1), (WETH, 1)]),
			pool(2, &[(DAI, 1), (WETH, 30)]),
			pool(3, &[(DAI, 1), (WETH, 20)]),
			pool(4, &[(DAI, 1), (USDC, 99)]),
		]);
		let cache = cache(fetcher, clock);

		let pools = cache
			.get_pools_for_pair(DAI, WETH, Duration::from_secs(1))
			.await;
		let ids: Vec<_> = pools.iter().map(|p| p.id).collect();
		assert_eq!(ids, vec![Address::repeat_byte(2), Address::repeat_byte(3)]);
	}

	#[tokio::test]
	async fn test_timeout_and_errors_degrade_to_empty() {
		let clock = Arc::new(ManualClock(AtomicU64::new(0)));
		let calls = Arc::new(AtomicUsize::new(0));
		let slow = StaticFetcher {
			pools: vec![pool(1, &[(DAI, 1), (WETH, 1)])],
			calls: calls.clone(),
			delay: Duration::from_millis(200),
			fail: false,
		};
		let cache = cache(slow, clock.clone());
		let pools = cache
			.get_pools_for_pair(DAI, WETH, Duration::from_millis(10))
			.await;
		assert!(pools.is_empty());

		let failing = StaticFetcher {
			pools: vec![],
			calls,
			delay: Duration::ZERO,
			fail: true,
		};
		let cache = self::cache(failing, clock);
		let pools = cache
			.get_pools_for_pair(DAI, WETH, Duration::from_secs(1))
			.await;
		assert!(pools.is_empty());
		assert_eq!(
			cache.get_cached_pool_addresses_for_pair(DAI, WETH, Some(10)),
			Some(vec![])
		);
	}

	#[tokio::test]
	async fn test_refresh_seeds_pairs_and_drives_sampling() {
		let clock = Arc::new(ManualClock(AtomicU64::new(0)));
		let (fetcher, calls) = fetcher(vec![
			pool(1, &[(DAI, 1), (WETH, 1), (USDC, 1)]),
			pool(2, &[(DAI, 1), (WETH, 1)]),
		]);
		let cache = cache(fetcher, clock.clone());

		assert_eq!(
			cache.how_to_sample(DAI, WETH, true),
			SamplingStrategy {
				on_chain: false,
				off_chain: true
			}
		);

		let pairs = cache.refresh_top_pools().await.unwrap();
		assert_eq!(pairs, 3);
		assert_eq!(
			cache
				.get_cached_pool_addresses_for_pair(WETH, DAI, None)
				.unwrap()
				.len(),
			2
		);
		assert_eq!(
			cache.how_to_sample(DAI, WETH, true),
			SamplingStrategy {
				on_chain: true,
				off_chain: false
			}
		);
		assert_eq!(cache.how_to_sample(DAI, WETH, false), SamplingStrategy::default());

		// Seeded entries are fresh, so no foreground fetch happens.
		cache
			.get_pools_for_pair(USDC, WETH, Duration::from_secs(1))
			.await;
		assert_eq!(calls.load(Ordering::SeqCst), 0);

		clock.0.store(20_000, Ordering::SeqCst);
		assert_eq!(
			cache.how_to_sample(DAI, WETH, true),
			SamplingStrategy {
				on_chain: false,
				off_chain: true
			}
		);
	}
}
