//! Swapper service wiring.
//!
//! Builds the sampler backend, pool cache, RFQ requestor, quoter and calldata
//! encoder from a [`SwapperConfig`] and exposes the operations the CLI runs.

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swapper_config::SwapperConfig;
use swapper_consumer::{AffiliateFee, CalldataInfo, CalldataOpts, ExchangeProxySwapQuoteConsumer};
use swapper_pools::implementations::subgraph::create_pool_fetcher;
use swapper_pools::{PoolFetcherInterface, PoolsCache, PoolsCacheConfig, SystemClock};
use swapper_quote::quoter::ExchangeProxyOverheadGas;
use swapper_quote::{MarketQuoteRequest, RfqMode, RfqQuoteOpts, SwapQuoter, SwapQuoterOpts};
use swapper_sampler::implementations::rpc::create_sampler;
use swapper_sampler::{
	DexOrderSampler, HttpRfqTransport, QuoteRequestor, RfqRequestOpts, RfqTransport,
	SamplerInterface,
};
use swapper_types::{
	Address, LiquiditySource, MarketOperation, SourceFlags, SwapQuote, ETH_TOKEN_ADDRESS,
	NULL_ADDRESS, U256,
};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Wei per gwei.
const GWEI: u64 = 1_000_000_000;

/// Sources a lone order is sent to directly, without the transformer pipeline.
const DIRECT_SOURCES: [LiquiditySource; 5] = [
	LiquiditySource::UniswapV2,
	LiquiditySource::SushiSwap,
	LiquiditySource::UniswapV3,
	LiquiditySource::PancakeSwap,
	LiquiditySource::LiquidityProvider,
];

/// Gas of going through the exchange proxy: nothing for a single direct
/// source, `base_gas` otherwise.
pub fn exchange_proxy_overhead(base_gas: u64) -> ExchangeProxyOverheadGas {
	Arc::new(move |flags: SourceFlags| {
		let single_direct = flags.0.count_ones() == 1
			&& DIRECT_SOURCES.iter().any(|source| flags.contains(*source));
		if single_direct {
			0
		} else {
			base_gas
		}
	})
}

/// Maps the `[quoter]` section onto quoter options.
pub fn quoter_opts(config: &SwapperConfig) -> SwapQuoterOpts {
	let quoter = &config.quoter;
	SwapQuoterOpts {
		chain_id: config.swapper.chain_id,
		exchange_proxy: config.contracts.exchange_proxy,
		num_samples: quoter.num_samples,
		sample_distribution_base: quoter.sample_distribution_base,
		bridge_slippage: quoter.bridge_slippage,
		max_fallback_slippage: quoter.max_fallback_slippage,
		allow_fallback: quoter.allow_fallback,
		protocol_fee_multiplier: U256::from(quoter.protocol_fee_multiplier),
		gas_schedule: quoter.gas_schedule,
		exchange_proxy_overhead: exchange_proxy_overhead(quoter.exchange_proxy_overhead_gas),
		pool_fetch_timeout: Duration::from_millis(quoter.pool_fetch_timeout_ms),
		source_filters: config.source_filters.clone(),
	}
}

fn pools_cache_config(config: &SwapperConfig) -> PoolsCacheConfig {
	let pools = &config.pools;
	PoolsCacheConfig {
		foreground_ttl_ms: pools.foreground_ttl_ms,
		background_ttl_ms: pools.background_ttl_ms,
		max_pools_fetched: pools.max_pools_fetched,
		sampling_max_age_ms: pools.sampling_max_age_ms,
		refresh_interval: Duration::from_secs(pools.refresh_interval_secs),
	}
}

/// A swap to quote and encode.
#[derive(Debug, Clone)]
pub struct SwapRequest {
	pub side: MarketOperation,
	/// `ETH_TOKEN_ADDRESS` sells native ether.
	pub sell_token: Address,
	/// `ETH_TOKEN_ADDRESS` buys native ether.
	pub buy_token: Address,
	/// Sell amount for sells, buy amount for buys.
	pub amount: U256,
	pub slippage: Option<Decimal>,
	/// Falls back to the configured gas price.
	pub gas_price: Option<U256>,
	pub taker: Option<Address>,
	pub rfq_mode: Option<RfqMode>,
	pub include_quote_report: bool,
	pub should_sell_entire_balance: bool,
	pub affiliate_fee: AffiliateFee,
}

impl SwapRequest {
	pub fn new(side: MarketOperation, sell_token: Address, buy_token: Address, amount: U256) -> Self {
		Self {
			side,
			sell_token,
			buy_token,
			amount,
			slippage: None,
			gas_price: None,
			taker: None,
			rfq_mode: None,
			include_quote_report: false,
			should_sell_entire_balance: false,
			affiliate_fee: AffiliateFee::default(),
		}
	}

	fn calldata_opts(&self) -> CalldataOpts {
		CalldataOpts {
			is_from_eth: self.sell_token == ETH_TOKEN_ADDRESS,
			is_to_eth: self.buy_token == ETH_TOKEN_ADDRESS,
			should_sell_entire_balance: self.should_sell_entire_balance,
			affiliate_fee: self.affiliate_fee.clone(),
			..CalldataOpts::default()
		}
	}
}

/// A quote and the transaction that executes it.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
	pub quote: SwapQuote,
	pub calldata: CalldataInfo,
}

/// Quoting and encoding service built from configuration.
pub struct SwapperService {
	config: SwapperConfig,
	quoter: SwapQuoter,
	consumer: ExchangeProxySwapQuoteConsumer,
	pools_cache: Option<Arc<PoolsCache>>,
}

impl SwapperService {
	/// Creates the service with the RPC sampler, the Balancer subgraph fetcher
	/// (when `[pools.fetcher]` is set) and HTTP RFQ.
	#[instrument(skip(config), fields(chain_id = config.swapper.chain_id))]
	pub fn new(config: SwapperConfig) -> Result<Self> {
		let sampler = create_sampler(&config.sampler.config).context("Failed to create sampler")?;
		let fetcher = config
			.pools
			.fetcher
			.as_table()
			.filter(|table| !table.is_empty())
			.map(|_| create_pool_fetcher(&config.pools.fetcher));
		let transport = Arc::new(HttpRfqTransport::new(reqwest::Client::new()));

		Self::with_components(config, Arc::from(sampler), fetcher, transport)
	}

	/// Creates the service around the given backends.
	pub fn with_components(
		config: SwapperConfig,
		sampler: Arc<dyn SamplerInterface>,
		fetcher: Option<Box<dyn PoolFetcherInterface>>,
		rfq_transport: Arc<dyn RfqTransport>,
	) -> Result<Self> {
		let consumer =
			ExchangeProxySwapQuoteConsumer::new(config.swapper.chain_id, config.contracts.clone())
				.context("Failed to resolve transformer deployments")?;

		let pools_cache = fetcher.map(|fetcher| {
			Arc::new(PoolsCache::new(
				fetcher,
				Arc::new(SystemClock),
				pools_cache_config(&config),
			))
		});

		let sampler = DexOrderSampler::new(sampler, config.sources.clone());
		let mut quoter = SwapQuoter::new(sampler, quoter_opts(&config))
			.with_quote_requestor(QuoteRequestor::new(config.rfq.clone(), rfq_transport));
		if let Some(cache) = &pools_cache {
			quoter = quoter.with_pools_cache(Arc::clone(cache));
		}

		info!(
			chain_id = config.swapper.chain_id,
			pool_cache = pools_cache.is_some(),
			rfq_makers = config.rfq.makers.len() + config.rfq.alt_makers.len(),
			"Swapper service initialized"
		);

		Ok(Self {
			config,
			quoter,
			consumer,
			pools_cache,
		})
	}

	pub fn pools_cache(&self) -> Option<&Arc<PoolsCache>> {
		self.pools_cache.as_ref()
	}

	/// Quotes the swap and encodes the exchange proxy call for it.
	#[instrument(skip(self, request), fields(side = ?request.side))]
	pub async fn quote(&self, request: &SwapRequest) -> Result<QuoteResponse> {
		let gas_price = request
			.gas_price
			.unwrap_or_else(|| U256::from(self.config.swapper.gas_price_gwei) * U256::from(GWEI));

		let mut market =
			MarketQuoteRequest::new(request.buy_token, request.sell_token, request.amount, gas_price);
		market.slippage = request.slippage;
		market.include_quote_report = request.include_quote_report;
		market.rfq = request.rfq_mode.map(|mode| {
			let taker = request.taker.unwrap_or(NULL_ADDRESS);
			RfqQuoteOpts {
				mode,
				request: RfqRequestOpts {
					taker_address: taker,
					tx_origin: taker,
					..RfqRequestOpts::default()
				},
			}
		});

		let quote = match request.side {
			MarketOperation::Sell => self.quoter.get_market_sell_quote(&market).await,
			MarketOperation::Buy => self.quoter.get_market_buy_quote(&market).await,
		}
		.context("Failed to build quote")?;

		let calldata = self
			.consumer
			.get_calldata(&quote, &request.calldata_opts())
			.context("Failed to encode calldata")?;

		info!(
			orders = quote.orders.len(),
			two_hop = quote.is_two_hop,
			maker_amount = %quote.best_case_quote_info.maker_amount,
			taker_amount = %quote.best_case_quote_info.taker_amount,
			"Quote ready"
		);

		Ok(QuoteResponse { quote, calldata })
	}

	/// Seeds the pool cache with the fetcher's top pools once.
	pub async fn refresh_pools(&self) -> Result<usize> {
		let cache = self.require_pools_cache()?;
		cache
			.refresh_top_pools()
			.await
			.context("Failed to refresh pools")
	}

	/// Starts the periodic pool refresh.
	pub fn spawn_pool_refresh(&self) -> Result<JoinHandle<()>> {
		let cache = self.require_pools_cache()?;
		Ok(Arc::clone(cache).spawn_refresh())
	}

	fn require_pools_cache(&self) -> Result<&Arc<PoolsCache>> {
		self.pools_cache
			.as_ref()
			.ok_or_else(|| anyhow!("No pool fetcher configured under [pools.fetcher]"))
	}
}
