//! Market sell and buy quotes.
//!
//! A quote is built in two phases. Phase one samples every on-chain source,
//! cached Balancer pools, limit orders and (optionally) indicative RFQ
//! levels in one pass, then runs the optimizer. When firm RFQ is requested,
//! phase two hands the phase-one price to the makers as a comparison price
//! and re-optimizes with the signed orders they return.

use alloy_primitives::{Address, B256, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use swapper_optimizer::{
	dex_samples_to_fills, eth_to_output_amount, native_orders_to_fills, two_hop_sample_to_fill,
	FillOpts, GasSchedule, OptimizedPath, OptimizerError, OptimizerOpts, PathOptimizer,
};
use swapper_pools::PoolsCache;
use swapper_sampler::{
	get_sample_amounts, BatchOperation, BatchResult, DexOrderSampler, QuoteRequestor,
	RfqFirmQuote, RfqIndicativeQuote, RfqRequestOpts,
};
use swapper_types::{
	Fill, LimitOrder, LiquiditySource, MarketOperation, NativeOrder,
	NativeOrderWithFillableAmounts, RfqOrder, Sample, Signature, SignatureType, SourceFilters,
	SourceFlags, SwapQuote, ETH_TOKEN_ADDRESS, NULL_ADDRESS,
};
use tracing::{debug, info, warn};

use crate::quote_info::{calculate_quote_info, QuoteInfoOpts};
use crate::report::{generate_quote_report, get_comparison_price};
use crate::QuoteError;

/// How RFQ makers take part in a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfqMode {
	/// Price levels only. The resulting orders are unsigned and only good
	/// for pricing.
	Indicative,
	/// Signed orders, requested once a first pass has priced the trade.
	Firm,
}

/// RFQ part of a quote request.
#[derive(Debug, Clone)]
pub struct RfqQuoteOpts {
	pub mode: RfqMode,
	pub request: RfqRequestOpts,
}

/// A market sell or buy to quote.
#[derive(Debug, Clone)]
pub struct MarketQuoteRequest {
	pub maker_token: Address,
	pub taker_token: Address,
	/// Taker amount for sells, maker amount for buys.
	pub amount: U256,
	/// Wei per gas unit.
	pub gas_price: U256,
	/// Overrides the default bridge slippage.
	pub slippage: Option<Decimal>,
	/// Merged with the quoter's own filters.
	pub filters: SourceFilters,
	/// Signed limit orders for the pair. Their fillable state is read on chain.
	pub limit_orders: Vec<(LimitOrder, Signature)>,
	pub rfq: Option<RfqQuoteOpts>,
	pub include_quote_report: bool,
}

impl MarketQuoteRequest {
	pub fn new(maker_token: Address, taker_token: Address, amount: U256, gas_price: U256) -> Self {
		Self {
			maker_token,
			taker_token,
			amount,
			gas_price,
			slippage: None,
			filters: SourceFilters::default(),
			limit_orders: Vec::new(),
			rfq: None,
			include_quote_report: false,
		}
	}
}

/// Gas of routing through the exchange proxy for a path using the given sources.
pub type ExchangeProxyOverheadGas = Arc<dyn Fn(SourceFlags) -> u64 + Send + Sync>;

/// Quoter-wide settings.
#[derive(Clone)]
pub struct SwapQuoterOpts {
	pub chain_id: u64,
	/// Exchange proxy the limit orders are filled against.
	pub exchange_proxy: Address,
	pub num_samples: usize,
	pub sample_distribution_base: f64,
	/// Default slippage of bridge orders in the worst case.
	pub bridge_slippage: Decimal,
	pub max_fallback_slippage: Decimal,
	pub allow_fallback: bool,
	/// Gas units charged as protocol fee per limit order.
	pub protocol_fee_multiplier: U256,
	pub gas_schedule: GasSchedule,
	pub exchange_proxy_overhead: ExchangeProxyOverheadGas,
	/// Time allowed to discover Balancer pools for an uncached pair.
	pub pool_fetch_timeout: Duration,
	/// Applied to every request.
	pub source_filters: SourceFilters,
}

impl Default for SwapQuoterOpts {
	fn default() -> Self {
		Self {
			chain_id: swapper_types::chain_id::MAINNET,
			exchange_proxy: alloy_primitives::address!("def1c0ded9bec7f1a1670819833240f027b25eff"),
			num_samples: 13,
			sample_distribution_base: 1.05,
			bridge_slippage: Decimal::new(5, 3),
			max_fallback_slippage: Decimal::new(5, 2),
			allow_fallback: true,
			protocol_fee_multiplier: U256::from(70_000u64),
			gas_schedule: GasSchedule::default(),
			exchange_proxy_overhead: Arc::new(|_| 0),
			pool_fetch_timeout: Duration::from_millis(1_000),
			source_filters: SourceFilters::default(),
		}
	}
}

impl std::fmt::Debug for SwapQuoterOpts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SwapQuoterOpts")
			.field("chain_id", &self.chain_id)
			.field("exchange_proxy", &self.exchange_proxy)
			.field("num_samples", &self.num_samples)
			.field("sample_distribution_base", &self.sample_distribution_base)
			.field("bridge_slippage", &self.bridge_slippage)
			.field("max_fallback_slippage", &self.max_fallback_slippage)
			.field("allow_fallback", &self.allow_fallback)
			.field("protocol_fee_multiplier", &self.protocol_fee_multiplier)
			.field("gas_schedule", &self.gas_schedule)
			.field("pool_fetch_timeout", &self.pool_fetch_timeout)
			.field("source_filters", &self.source_filters)
			.finish_non_exhaustive()
	}
}

/// Everything sampled for one side of a pair.
#[derive(Debug, Clone)]
pub struct MarketSideLiquidity {
	pub side: MarketOperation,
	pub maker_token: Address,
	pub taker_token: Address,
	pub input_amount: U256,
	pub block_number: u64,
	pub maker_token_decimals: u8,
	pub taker_token_decimals: u8,
	/// Maker token base units per whole ether.
	pub maker_amount_per_eth: U256,
	/// Taker token base units per whole ether.
	pub taker_amount_per_eth: U256,
	pub native_orders: Vec<NativeOrderWithFillableAmounts>,
	/// One sample vector per source path, drained paths left out.
	pub dex_samples: Vec<Vec<Sample>>,
	pub two_hop_samples: Vec<Sample>,
	pub indicative_quotes: Vec<RfqIndicativeQuote>,
}

impl MarketSideLiquidity {
	fn fill_opts(&self, gas_price: U256, gas_schedule: GasSchedule) -> FillOpts {
		let (input_amount_per_eth, output_amount_per_eth) = match self.side {
			MarketOperation::Sell => (self.taker_amount_per_eth, self.maker_amount_per_eth),
			MarketOperation::Buy => (self.maker_amount_per_eth, self.taker_amount_per_eth),
		};
		FillOpts {
			gas_price,
			input_amount_per_eth,
			output_amount_per_eth,
			gas_schedule,
		}
	}
}

/// An unsigned RFQ order standing in for an indicative price level.
///
/// The salt is the quote's position so that levels from different makers
/// stay separate source paths.
fn indicative_order(index: usize, quote: &RfqIndicativeQuote) -> Option<NativeOrderWithFillableAmounts> {
	let order = RfqOrder {
		maker_token: quote.maker_token,
		taker_token: quote.taker_token,
		maker_amount: u128::try_from(quote.maker_amount).ok()?,
		taker_amount: u128::try_from(quote.taker_amount).ok()?,
		maker: NULL_ADDRESS,
		taker: NULL_ADDRESS,
		tx_origin: NULL_ADDRESS,
		pool: B256::ZERO,
		expiry: quote.expiry,
		salt: U256::from(index),
	};
	Some(NativeOrderWithFillableAmounts::fully_fillable(
		NativeOrder::Rfq(order),
		Signature {
			signature_type: SignatureType::Invalid,
			v: 0,
			r: B256::ZERO,
			s: B256::ZERO,
		},
	))
}

/// Builds swap quotes from sampled liquidity.
pub struct SwapQuoter {
	sampler: DexOrderSampler,
	pools_cache: Option<Arc<PoolsCache>>,
	quote_requestor: Option<QuoteRequestor>,
	opts: SwapQuoterOpts,
}

impl SwapQuoter {
	pub fn new(sampler: DexOrderSampler, opts: SwapQuoterOpts) -> Self {
		Self {
			sampler,
			pools_cache: None,
			quote_requestor: None,
			opts,
		}
	}

	/// Samples Balancer through `pools_cache`.
	pub fn with_pools_cache(mut self, pools_cache: Arc<PoolsCache>) -> Self {
		self.pools_cache = Some(pools_cache);
		self
	}

	/// Enables RFQ quotes.
	pub fn with_quote_requestor(mut self, quote_requestor: QuoteRequestor) -> Self {
		self.quote_requestor = Some(quote_requestor);
		self
	}

	pub fn opts(&self) -> &SwapQuoterOpts {
		&self.opts
	}

	pub fn sampler(&self) -> &DexOrderSampler {
		&self.sampler
	}

	/// Quotes selling exactly `request.amount` of the taker token.
	pub async fn get_market_sell_quote(
		&self,
		request: &MarketQuoteRequest,
	) -> Result<SwapQuote, QuoteError> {
		self.get_market_quote(MarketOperation::Sell, request).await
	}

	/// Quotes buying exactly `request.amount` of the maker token.
	pub async fn get_market_buy_quote(
		&self,
		request: &MarketQuoteRequest,
	) -> Result<SwapQuote, QuoteError> {
		self.get_market_quote(MarketOperation::Buy, request).await
	}

	/// ETH is traded as WETH.
	fn normalize_token(&self, token: Address) -> Address {
		if token == ETH_TOKEN_ADDRESS {
			self.sampler.sources().weth
		} else {
			token
		}
	}

	async fn get_market_quote(
		&self,
		side: MarketOperation,
		request: &MarketQuoteRequest,
	) -> Result<SwapQuote, QuoteError> {
		if request.amount.is_zero() {
			return Err(QuoteError::InvalidRequest("amount must be positive".into()));
		}
		let slippage = request.slippage.unwrap_or(self.opts.bridge_slippage);
		if slippage < Decimal::ZERO || slippage > Decimal::ONE {
			return Err(QuoteError::InvalidRequest(format!(
				"slippage {} is outside [0, 1]",
				slippage
			)));
		}
		let maker_token = self.normalize_token(request.maker_token);
		let taker_token = self.normalize_token(request.taker_token);
		if maker_token == taker_token {
			return Err(QuoteError::InvalidRequest(
				"maker and taker token must differ".into(),
			));
		}
		let filters = self.opts.source_filters.merge(&request.filters);

		let liquidity = self
			.get_market_side_liquidity(side, maker_token, taker_token, request, &filters)
			.await?;
		debug!(
			block = liquidity.block_number,
			dex_paths = liquidity.dex_samples.len(),
			two_hop = liquidity.two_hop_samples.len(),
			native = liquidity.native_orders.len(),
			indicative = liquidity.indicative_quotes.len(),
			"Gathered liquidity"
		);

		let fill_opts = liquidity.fill_opts(request.gas_price, self.opts.gas_schedule);
		let optimizer = self.optimizer(slippage, &fill_opts);

		let mut considered_orders = liquidity.native_orders.clone();
		considered_orders.extend(
			liquidity
				.indicative_quotes
				.iter()
				.enumerate()
				.filter_map(|(i, q)| indicative_order(i, q)),
		);
		let phase_one = Self::optimize(&optimizer, &liquidity, &considered_orders, &fill_opts);

		let mut firm_quotes: Vec<RfqFirmQuote> = Vec::new();
		let mut comparison_price = None;
		let result = match (&request.rfq, &self.quote_requestor) {
			(Some(rfq), Some(requestor))
				if rfq.mode == RfqMode::Firm
					&& filters.is_allowed(LiquiditySource::Native)
					&& requestor.has_makers_for(maker_token, taker_token) =>
			{
				comparison_price = phase_one.as_ref().ok().and_then(|p| {
					get_comparison_price(
						&p.optimal,
						side,
						request.amount,
						liquidity.maker_token_decimals,
						liquidity.taker_token_decimals,
					)
				});
				let request_opts = RfqRequestOpts {
					comparison_price,
					..rfq.request.clone()
				};
				firm_quotes = requestor
					.request_firm_quotes(maker_token, taker_token, request.amount, side, &request_opts)
					.await;
				if firm_quotes.is_empty() {
					phase_one
				} else {
					info!(count = firm_quotes.len(), "Re-optimizing with firm RFQ quotes");
					considered_orders.extend(firm_quotes.iter().map(|q| q.order.clone()));
					Self::optimize(&optimizer, &liquidity, &considered_orders, &fill_opts)
				}
			}
			_ => phase_one,
		};
		let optimized = result.map_err(|e| QuoteError::from_optimizer(e, side))?;

		let optimal = &optimized.optimal;
		let is_two_hop = optimal.is_two_hop();
		let orders = optimal.create_orders(maker_token, taker_token);
		let fallback_orders = optimized
			.fallback
			.as_ref()
			.map(|p| p.create_orders(maker_token, taker_token))
			.unwrap_or_default();

		let infos = calculate_quote_info(
			&orders,
			is_two_hop,
			&QuoteInfoOpts {
				side,
				slippage,
				gas_price: request.gas_price,
				protocol_fee_multiplier: self.opts.protocol_fee_multiplier,
				overhead_gas: (self.opts.exchange_proxy_overhead)(optimal.source_flags()),
			},
		)
		.map_err(|e| QuoteError::from_optimizer(e, side))?;

		let quote_report = request.include_quote_report.then(|| {
			generate_quote_report(
				side,
				&liquidity.dex_samples,
				&liquidity.two_hop_samples,
				&considered_orders,
				&firm_quotes,
				optimal,
				comparison_price,
			)
		});

		info!(
			side = ?side,
			orders = orders.len(),
			is_two_hop,
			maker_amount = %infos.best_case.maker_amount,
			taker_amount = %infos.best_case.total_taker_amount,
			"Built swap quote"
		);

		Ok(SwapQuote {
			side,
			maker_token,
			taker_token,
			fill_amount: request.amount,
			orders,
			fallback_orders,
			is_two_hop,
			best_case_quote_info: infos.best_case,
			worst_case_quote_info: infos.worst_case,
			source_breakdown: infos.source_breakdown,
			gas_price: request.gas_price,
			maker_amount_per_eth: liquidity.maker_amount_per_eth,
			taker_amount_per_eth: liquidity.taker_amount_per_eth,
			block_number: liquidity.block_number,
			quote_report,
		})
	}

	/// An optimizer whose proxy overhead is priced in output units at this
	/// request's gas price.
	fn optimizer(&self, slippage: Decimal, fill_opts: &FillOpts) -> PathOptimizer {
		let overhead_gas = Arc::clone(&self.opts.exchange_proxy_overhead);
		let fill_opts = fill_opts.clone();
		PathOptimizer::new(OptimizerOpts {
			bridge_slippage: slippage,
			max_fallback_slippage: self.opts.max_fallback_slippage,
			allow_fallback: self.opts.allow_fallback,
			exchange_proxy_overhead: Arc::new(move |flags| {
				let eth_amount = fill_opts
					.gas_price
					.saturating_mul(U256::from(overhead_gas(flags)));
				eth_to_output_amount(
					U256::ZERO,
					U256::ZERO,
					eth_amount,
					fill_opts.input_amount_per_eth,
					fill_opts.output_amount_per_eth,
				)
			}),
		})
	}

	fn optimize(
		optimizer: &PathOptimizer,
		liquidity: &MarketSideLiquidity,
		native_orders: &[NativeOrderWithFillableAmounts],
		fill_opts: &FillOpts,
	) -> Result<OptimizedPath, OptimizerError> {
		let side = liquidity.side;
		let mut fills: Vec<Vec<Fill>> = liquidity
			.dex_samples
			.iter()
			.map(|samples| dex_samples_to_fills(side, samples, fill_opts))
			.collect();
		fills.extend(
			native_orders_to_fills(side, native_orders, liquidity.input_amount, fill_opts)
				.into_iter()
				.map(|f| vec![f]),
		);
		let two_hop = liquidity
			.two_hop_samples
			.iter()
			.map(|s| two_hop_sample_to_fill(side, s, fill_opts))
			.collect();
		optimizer.optimize(side, liquidity.input_amount, fills, two_hop)
	}

	/// Samples every allowed source for one side of a pair.
	///
	/// All on-chain reads share one batch. Off-chain Balancer sampling and
	/// indicative RFQ requests run alongside it.
	pub async fn get_market_side_liquidity(
		&self,
		side: MarketOperation,
		maker_token: Address,
		taker_token: Address,
		request: &MarketQuoteRequest,
		filters: &SourceFilters,
	) -> Result<MarketSideLiquidity, QuoteError> {
		let amounts = get_sample_amounts(
			request.amount,
			self.opts.num_samples,
			self.opts.sample_distribution_base,
		);
		let balancer_allowed = filters.is_allowed(LiquiditySource::Balancer);
		let strategy = self
			.pools_cache
			.as_ref()
			.map(|c| c.how_to_sample(taker_token, maker_token, balancer_allowed))
			.unwrap_or_default();

		let limit_orders: Vec<(LimitOrder, Signature)> = if filters.is_allowed(LiquiditySource::Native)
		{
			request
				.limit_orders
				.iter()
				.filter(|(o, _)| o.maker_token == maker_token && o.taker_token == taker_token)
				.cloned()
				.collect()
		} else {
			Vec::new()
		};
		let fillable_operation = match side {
			MarketOperation::Sell => BatchOperation::LimitOrderFillableTakerAmounts {
				orders: limit_orders.clone(),
				exchange: self.opts.exchange_proxy,
			},
			MarketOperation::Buy => BatchOperation::LimitOrderFillableMakerAmounts {
				orders: limit_orders.clone(),
				exchange: self.opts.exchange_proxy,
			},
		};

		let mut operations = vec![
			BatchOperation::BlockNumber,
			BatchOperation::TokenDecimals(vec![maker_token, taker_token]),
			fillable_operation,
			self.sampler.native_token_rate_operation(filters, maker_token),
			self.sampler.native_token_rate_operation(filters, taker_token),
		];
		let mut dex_queries = self
			.sampler
			.dex_queries(side, filters, taker_token, maker_token, &amounts);
		if let Some(cache) = self.pools_cache.as_ref().filter(|_| strategy.on_chain) {
			let pools = cache
				.get_cached_pool_addresses_for_pair(taker_token, maker_token, None)
				.unwrap_or_default();
			dex_queries.extend(
				self.sampler
					.balancer_queries(side, &pools, taker_token, maker_token, &amounts),
			);
			if !cache.is_fresh(taker_token, maker_token) {
				let cache = Arc::clone(cache);
				let timeout = self.opts.pool_fetch_timeout;
				tokio::spawn(async move {
					cache.get_pools_for_pair(taker_token, maker_token, timeout).await;
				});
			}
		}
		let dex_count = dex_queries.len();
		operations.extend(dex_queries.into_iter().map(BatchOperation::DexQuotes));
		operations.extend(
			self.sampler
				.two_hop_queries(side, filters, taker_token, maker_token, request.amount)
				.into_iter()
				.map(BatchOperation::TwoHopQuote),
		);

		let off_chain = async {
			match self.pools_cache.as_ref().filter(|_| strategy.off_chain) {
				Some(cache) => {
					let pools = cache
						.get_pools_for_pair(taker_token, maker_token, self.opts.pool_fetch_timeout)
						.await;
					DexOrderSampler::sample_pools_off_chain(
						side,
						LiquiditySource::Balancer,
						&pools,
						taker_token,
						maker_token,
						&amounts,
					)
				}
				None => Vec::new(),
			}
		};
		let indicative = async {
			match (&request.rfq, &self.quote_requestor) {
				(Some(rfq), Some(requestor))
					if rfq.mode == RfqMode::Indicative
						&& filters.is_allowed(LiquiditySource::Native) =>
				{
					requestor
						.request_indicative_quotes(
							maker_token,
							taker_token,
							request.amount,
							side,
							&rfq.request,
						)
						.await
				}
				_ => Vec::new(),
			}
		};

		let (batch, off_chain_samples, indicative_quotes) =
			futures::join!(self.sampler.execute_batch(&operations), off_chain, indicative);
		let batch = batch.inspect_err(|e| warn!(error = %e, "Sampler batch failed"))?;
		let mut results = batch.into_iter();

		let block_number = results
			.next()
			.and_then(|r| r.block_number())
			.unwrap_or_default();
		let decimals = results.next().map(|r| r.token_decimals()).unwrap_or_default();
		let fillable = results
			.next()
			.map(BatchResult::into_fillable_amounts)
			.unwrap_or_default();
		let maker_amount_per_eth = results
			.next()
			.map(|r| r.native_token_rate())
			.unwrap_or_default();
		let taker_amount_per_eth = results
			.next()
			.map(|r| r.native_token_rate())
			.unwrap_or_default();
		let mut dex_samples: Vec<Vec<Sample>> = results
			.by_ref()
			.take(dex_count)
			.map(BatchResult::into_samples)
			.filter(|s| !s.is_empty())
			.collect();
		dex_samples.extend(off_chain_samples.into_iter().filter(|s| !s.is_empty()));
		let two_hop_samples = results.filter_map(BatchResult::into_two_hop).collect();

		let native_orders = limit_orders
			.into_iter()
			.zip(fillable)
			.map(|((order, signature), amount)| match side {
				MarketOperation::Sell => NativeOrderWithFillableAmounts::from_fillable_taker_amount(
					NativeOrder::Limit(order),
					signature,
					amount,
				),
				MarketOperation::Buy => NativeOrderWithFillableAmounts::from_fillable_maker_amount(
					NativeOrder::Limit(order),
					signature,
					amount,
				),
			})
			.collect();

		Ok(MarketSideLiquidity {
			side,
			maker_token,
			taker_token,
			input_amount: request.amount,
			block_number,
			maker_token_decimals: decimals.first().copied().unwrap_or(18),
			taker_token_decimals: decimals.get(1).copied().unwrap_or(18),
			maker_amount_per_eth,
			taker_amount_per_eth,
			native_orders,
			dex_samples,
			two_hop_samples,
			indicative_quotes,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::Bytes;
	use alloy_sol_types::{SolCall, SolValue};
	use async_trait::async_trait;
	use serde_json::{json, Value};
	use std::sync::Mutex;
	use swapper_sampler::{
		CallResult, RfqConfig, RfqTransport, SamplerError, SamplerInterface, SourcesConfig,
	};
	use swapper_sampler::rfq::RfqMakerConfig;
	use swapper_types::{
		current_timestamp, BreakdownEntry, ConfigSchema, QuoteReportEntry, Schema, ValidationError,
	};

	const TAKER_TOKEN: Address = Address::repeat_byte(0x11);
	const MAKER_TOKEN: Address = Address::repeat_byte(0x22);
	const WETH: Address = Address::repeat_byte(0x33);
	const UNI_ROUTER: Address = Address::repeat_byte(0x44);
	const TAKER: Address = Address::repeat_byte(0x77);
	const MAKER_URI: &str = "https://maker.test";

	mod mock_abi {
		alloy_sol_types::sol! {
			interface Sampler {
				function getBlockNumber() external view returns (uint256 blockNumber);
				function getTokenDecimals(address[] tokens) external view returns (uint256[] decimals);
				function sampleSellsFromUniswapV2(
					address router,
					address[] path,
					uint256[] takerTokenAmounts
				) external view returns (uint256[] makerTokenAmounts);
				function sampleBuysFromUniswapV2(
					address router,
					address[] path,
					uint256[] makerTokenAmounts
				) external view returns (uint256[] takerTokenAmounts);
			}
		}
	}
	use mock_abi::Sampler;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	/// A single constant-product pool behind `UNI_ROUTER`, direct paths only.
	struct MockChain {
		reserves: Option<(u128, u128)>,
	}

	impl MockChain {
		fn ok(data: Vec<u8>) -> CallResult {
			CallResult {
				data: Bytes::from(data),
				success: true,
			}
		}

		fn answer(&self, call: &[u8]) -> CallResult {
			let revert = CallResult {
				data: Bytes::new(),
				success: false,
			};
			let Some(selector) = call.get(..4) else {
				return revert;
			};
			if selector == Sampler::getBlockNumberCall::SELECTOR {
				return Self::ok(U256::from(77).abi_encode());
			}
			if selector == Sampler::getTokenDecimalsCall::SELECTOR {
				let Ok(decoded) = Sampler::getTokenDecimalsCall::abi_decode(call, true) else {
					return revert;
				};
				return Self::ok(vec![U256::from(18); decoded.tokens.len()].abi_encode());
			}
			let Some((x, y)) = self.reserves else {
				return revert;
			};
			let (x, y) = (U256::from(x), U256::from(y));
			if selector == Sampler::sampleSellsFromUniswapV2Call::SELECTOR {
				let Ok(decoded) = Sampler::sampleSellsFromUniswapV2Call::abi_decode(call, true) else {
					return revert;
				};
				if decoded.router != UNI_ROUTER || decoded.path.len() != 2 {
					return revert;
				}
				let outputs: Vec<U256> = decoded
					.takerTokenAmounts
					.iter()
					.map(|a| y * *a / (x + *a))
					.collect();
				return Self::ok(outputs.abi_encode());
			}
			if selector == Sampler::sampleBuysFromUniswapV2Call::SELECTOR {
				let Ok(decoded) = Sampler::sampleBuysFromUniswapV2Call::abi_decode(call, true) else {
					return revert;
				};
				if decoded.router != UNI_ROUTER || decoded.path.len() != 2 {
					return revert;
				}
				let inputs: Vec<U256> = decoded
					.makerTokenAmounts
					.iter()
					.map(|a| x * *a / (y - *a) + U256::from(1))
					.collect();
				return Self::ok(inputs.abi_encode());
			}
			revert
		}
	}

	#[async_trait]
	impl SamplerInterface for MockChain {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn batch_call(&self, calls: Vec<Bytes>) -> Result<Vec<CallResult>, SamplerError> {
			Ok(calls.iter().map(|c| self.answer(c)).collect())
		}
	}

	/// Answers firm quote requests with one signed order.
	struct MockMaker {
		maker_amount: u128,
		queries: Mutex<Vec<Vec<(String, String)>>>,
	}

	#[async_trait]
	impl RfqTransport for MockMaker {
		async fn get(
			&self,
			url: &str,
			query: &[(String, String)],
			_headers: &[(String, String)],
		) -> Result<Value, SamplerError> {
			self.queries.lock().unwrap().push(query.to_vec());
			if url != format!("{}/quote", MAKER_URI) {
				return Err(SamplerError::Transport("404".into()));
			}
			Ok(json!({
				"signedOrder": {
					"makerToken": format!("{:#x}", MAKER_TOKEN),
					"takerToken": format!("{:#x}", TAKER_TOKEN),
					"makerAmount": self.maker_amount.to_string(),
					"takerAmount": "1000",
					"maker": format!("{:#x}", Address::repeat_byte(0x99)),
					"taker": format!("{:#x}", TAKER),
					"txOrigin": format!("{:#x}", TAKER),
					"pool": format!("{:#x}", B256::ZERO),
					"expiry": (current_timestamp() + 600).to_string(),
					"salt": "1",
					"signature": {
						"signatureType": 2,
						"v": 27,
						"r": format!("{:#x}", B256::repeat_byte(1)),
						"s": format!("{:#x}", B256::repeat_byte(2)),
					}
				}
			}))
		}

		async fn post(
			&self,
			_url: &str,
			_body: &Value,
			_headers: &[(String, String)],
		) -> Result<Value, SamplerError> {
			Err(SamplerError::Transport("unexpected post".into()))
		}
	}

	fn quoter(reserves: Option<(u128, u128)>) -> SwapQuoter {
		let sources = SourcesConfig {
			weth: WETH,
			uniswap_v2_router: Some(UNI_ROUTER),
			..Default::default()
		};
		let sampler = DexOrderSampler::new(Arc::new(MockChain { reserves }), sources);
		SwapQuoter::new(sampler, SwapQuoterOpts::default())
	}

	fn request(amount: u64) -> MarketQuoteRequest {
		MarketQuoteRequest::new(MAKER_TOKEN, TAKER_TOKEN, U256::from(amount), U256::ZERO)
	}

	#[tokio::test]
	async fn test_market_sell_quote_from_single_pool() {
		let quoter = quoter(Some((1_000_000, 2_000_000)));
		let quote = quoter.get_market_sell_quote(&request(1_000)).await.unwrap();

		assert_eq!(quote.block_number, 77);
		assert_eq!(quote.orders.len(), 1);
		assert_eq!(quote.orders[0].source, LiquiditySource::UniswapV2);
		assert_eq!(quote.best_case_quote_info.taker_amount, U256::from(1_000));
		assert_eq!(quote.best_case_quote_info.maker_amount, U256::from(1_998));
		// 0.5% default slippage, rounded down.
		assert_eq!(quote.worst_case_quote_info.maker_amount, U256::from(1_988));
		assert_eq!(
			quote.source_breakdown.get(&LiquiditySource::UniswapV2),
			Some(&BreakdownEntry::Proportion(Decimal::ONE))
		);
		assert_eq!(quote.taker_token_fill_amount(), Some(U256::from(1_000)));
		assert!(quote.quote_report.is_none());
	}

	#[tokio::test]
	async fn test_market_buy_quote_from_single_pool() {
		let quoter = quoter(Some((1_000_000, 2_000_000)));
		let quote = quoter.get_market_buy_quote(&request(1_000)).await.unwrap();

		assert_eq!(quote.best_case_quote_info.maker_amount, U256::from(1_000));
		assert_eq!(quote.best_case_quote_info.taker_amount, U256::from(501));
		assert!(quote.worst_case_quote_info.taker_amount >= U256::from(501));
		assert_eq!(quote.maker_token_fill_amount(), Some(U256::from(1_000)));
	}

	#[tokio::test]
	async fn test_quote_errors() {
		let dry = quoter(None);
		match dry.get_market_sell_quote(&request(1_000)).await {
			Err(QuoteError::AssetUnavailable { field }) => assert_eq!(field, "sellAmount"),
			other => panic!("unexpected result {:?}", other),
		}

		let quoter = quoter(Some((1_000_000, 2_000_000)));
		assert!(matches!(
			quoter.get_market_sell_quote(&request(0)).await,
			Err(QuoteError::InvalidRequest(_))
		));

		let mut same_token = request(1_000);
		same_token.taker_token = MAKER_TOKEN;
		assert!(matches!(
			quoter.get_market_buy_quote(&same_token).await,
			Err(QuoteError::InvalidRequest(_))
		));

		let mut bad_slippage = request(1_000);
		bad_slippage.slippage = Some(Decimal::new(15, 1));
		assert!(matches!(
			quoter.get_market_sell_quote(&bad_slippage).await,
			Err(QuoteError::InvalidRequest(_))
		));
	}

	#[tokio::test]
	async fn test_firm_rfq_quote_beats_pool() {
		let maker = Arc::new(MockMaker {
			maker_amount: 2_100,
			queries: Mutex::new(Vec::new()),
		});
		let requestor = QuoteRequestor::new(
			RfqConfig {
				makers: vec![RfqMakerConfig {
					uri: MAKER_URI.to_string(),
					pairs: vec![(TAKER_TOKEN, MAKER_TOKEN)],
				}],
				..Default::default()
			},
			maker.clone(),
		);
		let quoter = quoter(Some((1_000_000, 2_000_000))).with_quote_requestor(requestor);

		let mut request = request(1_000);
		request.include_quote_report = true;
		request.rfq = Some(RfqQuoteOpts {
			mode: RfqMode::Firm,
			request: RfqRequestOpts {
				taker_address: TAKER,
				tx_origin: TAKER,
				..Default::default()
			},
		});
		let quote = quoter.get_market_sell_quote(&request).await.unwrap();

		// Makers were shown the pool's price of 1998 per 1000.
		let queries = maker.queries.lock().unwrap().clone();
		assert_eq!(queries.len(), 1);
		assert!(queries[0]
			.iter()
			.any(|(k, v)| k == "comparisonPrice" && v == "1.998"));

		assert_eq!(quote.orders.len(), 1);
		assert_eq!(quote.orders[0].source, LiquiditySource::Native);
		assert_eq!(quote.best_case_quote_info.maker_amount, U256::from(2_100));
		// Signed orders do not slip.
		assert_eq!(quote.worst_case_quote_info.maker_amount, U256::from(2_100));
		// RFQ orders pay no protocol fee.
		assert_eq!(quote.best_case_quote_info.protocol_fee_in_wei_amount, U256::ZERO);

		let report = quote.quote_report.unwrap();
		assert_eq!(report.sources_considered.len(), 2);
		match &report.sources_delivered[0] {
			QuoteReportEntry::NativeRfqOrder { maker_uri, .. } => {
				assert_eq!(maker_uri.as_deref(), Some(MAKER_URI))
			}
			other => panic!("unexpected entry {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_firm_rfq_without_quotes_keeps_first_pass() {
		let maker = Arc::new(MockMaker {
			maker_amount: 2_100,
			queries: Mutex::new(Vec::new()),
		});
		let requestor = QuoteRequestor::new(
			RfqConfig {
				makers: vec![RfqMakerConfig {
					uri: "https://other.test".to_string(),
					pairs: vec![(TAKER_TOKEN, MAKER_TOKEN)],
				}],
				..Default::default()
			},
			maker,
		);
		let quoter = quoter(Some((1_000_000, 2_000_000))).with_quote_requestor(requestor);

		let mut request = request(1_000);
		request.rfq = Some(RfqQuoteOpts {
			mode: RfqMode::Firm,
			request: RfqRequestOpts {
				taker_address: TAKER,
				tx_origin: TAKER,
				..Default::default()
			},
		});
		let quote = quoter.get_market_sell_quote(&request).await.unwrap();
		assert_eq!(quote.orders[0].source, LiquiditySource::UniswapV2);
		assert_eq!(quote.best_case_quote_info.maker_amount, U256::from(1_998));
	}

	#[test]
	fn test_indicative_quotes_become_distinct_unsigned_orders() {
		let quote = RfqIndicativeQuote {
			maker_token: MAKER_TOKEN,
			taker_token: TAKER_TOKEN,
			maker_amount: U256::from(10),
			taker_amount: U256::from(5),
			expiry: 100,
			maker_uri: MAKER_URI.to_string(),
		};
		let first = indicative_order(0, &quote).unwrap();
		let second = indicative_order(1, &quote).unwrap();
		assert_ne!(first.order.salt(), second.order.salt());
		assert_eq!(first.signature.signature_type, SignatureType::Invalid);
		assert_eq!(first.fillable_maker_amount, U256::from(10));

		let huge = RfqIndicativeQuote {
			maker_amount: U256::MAX,
			..quote
		};
		assert!(indicative_order(0, &huge).is_none());
	}
}
