//! Batched on-chain sampling.
//!
//! Every read a quote needs is expressed as a [`BatchOperation`]. A batch of
//! operations is encoded into sub-calls of the sampler contract's
//! `batchCall`, executed in one round trip and decoded back per operation.
//! Operations that need no call resolve locally, and a failed sub-call
//! collapses to an empty result for its operation only.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use std::sync::Arc;
use swapper_types::{
	FillData, HopSource, LimitOrder, LiquiditySource, MarketOperation, Pool, Sample, Signature,
	SourceFilters, UniswapV3PathAmount, ONE_ETHER,
};
use tracing::debug;

use crate::abi::{self, IERC20BridgeSampler as Sampler};
use crate::sources::SourcesConfig;
use crate::{CallResult, SamplerError, SamplerInterface};

/// A sampling query against one source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexQuery {
	pub side: MarketOperation,
	pub source: LiquiditySource,
	/// Fill data shared by every sample of this path.
	pub fill_data: FillData,
	pub taker_token: Address,
	pub maker_token: Address,
	pub amounts: Vec<U256>,
}

impl DexQuery {
	fn with_amounts(&self, amounts: Vec<U256>) -> Self {
		Self {
			amounts,
			..self.clone()
		}
	}

	/// Encodes the sampler call, or `None` for sources that are not sampled on chain.
	pub fn encode(&self) -> Option<Bytes> {
		if self.amounts.is_empty() {
			return None;
		}
		let amounts = self.amounts.clone();
		let sell = self.side == MarketOperation::Sell;
		let data = match &self.fill_data {
			FillData::UniswapV2 {
				router,
				token_address_path,
			} => {
				if sell {
					Sampler::sampleSellsFromUniswapV2Call {
						router: *router,
						path: token_address_path.clone(),
						takerTokenAmounts: amounts,
					}
					.abi_encode()
				} else {
					Sampler::sampleBuysFromUniswapV2Call {
						router: *router,
						path: token_address_path.clone(),
						makerTokenAmounts: amounts,
					}
					.abi_encode()
				}
			}
			FillData::UniswapV3 {
				quoter,
				token_address_path,
				..
			} => {
				if sell {
					Sampler::sampleSellsFromUniswapV3Call {
						quoter: *quoter,
						path: token_address_path.clone(),
						takerTokenAmounts: amounts,
					}
					.abi_encode()
				} else {
					Sampler::sampleBuysFromUniswapV3Call {
						quoter: *quoter,
						path: token_address_path.clone(),
						makerTokenAmounts: amounts,
					}
					.abi_encode()
				}
			}
			FillData::Curve {
				pool,
				from_token_idx,
				to_token_idx,
			} => {
				let curve_info = abi::CurveInfo {
					poolAddress: pool.pool_address,
					sellQuoteFunctionSelector: pool.sell_quote_function_selector,
					buyQuoteFunctionSelector: pool.buy_quote_function_selector,
				};
				if sell {
					Sampler::sampleSellsFromCurveCall {
						curveInfo: curve_info,
						fromTokenIdx: i128::from(*from_token_idx),
						toTokenIdx: i128::from(*to_token_idx),
						takerTokenAmounts: amounts,
					}
					.abi_encode()
				} else {
					Sampler::sampleBuysFromCurveCall {
						curveInfo: curve_info,
						fromTokenIdx: i128::from(*from_token_idx),
						toTokenIdx: i128::from(*to_token_idx),
						makerTokenAmounts: amounts,
					}
					.abi_encode()
				}
			}
			FillData::Balancer { pool_address } => {
				if sell {
					Sampler::sampleSellsFromBalancerCall {
						poolAddress: *pool_address,
						takerToken: self.taker_token,
						makerToken: self.maker_token,
						takerTokenAmounts: amounts,
					}
					.abi_encode()
				} else {
					Sampler::sampleBuysFromBalancerCall {
						poolAddress: *pool_address,
						takerToken: self.taker_token,
						makerToken: self.maker_token,
						makerTokenAmounts: amounts,
					}
					.abi_encode()
				}
			}
			FillData::LiquidityProvider { pool_address, .. } => {
				if sell {
					Sampler::sampleSellsFromLiquidityProviderCall {
						providerAddress: *pool_address,
						takerToken: self.taker_token,
						makerToken: self.maker_token,
						takerTokenAmounts: amounts,
					}
					.abi_encode()
				} else {
					Sampler::sampleBuysFromLiquidityProviderCall {
						providerAddress: *pool_address,
						takerToken: self.taker_token,
						makerToken: self.maker_token,
						makerTokenAmounts: amounts,
					}
					.abi_encode()
				}
			}
			FillData::Native(_) | FillData::MultiHop { .. } => return None,
		};
		Some(Bytes::from(data))
	}

	/// Decodes the outputs of this query's call, index-aligned with `amounts`.
	fn decode_outputs(&self, data: &[u8]) -> Result<(Vec<U256>, FillData), alloy_sol_types::Error> {
		let sell = self.side == MarketOperation::Sell;
		let outputs = match &self.fill_data {
			FillData::UniswapV3 {
				router,
				quoter,
				token_address_path,
				..
			} => {
				let (paths, gas_used, outputs) = if sell {
					let r = Sampler::sampleSellsFromUniswapV3Call::abi_decode_returns(data, true)?;
					(r.uniswapPaths, r.uniswapGasUsed, r.makerTokenAmounts)
				} else {
					let r = Sampler::sampleBuysFromUniswapV3Call::abi_decode_returns(data, true)?;
					(r.uniswapPaths, r.uniswapGasUsed, r.takerTokenAmounts)
				};
				let path_amounts = paths
					.into_iter()
					.zip(gas_used)
					.zip(self.amounts.iter())
					.map(|((uniswap_path, gas), input)| UniswapV3PathAmount {
						uniswap_path,
						input_amount: *input,
						gas_used: gas.saturating_to::<u64>(),
					})
					.collect();
				let fill_data = FillData::UniswapV3 {
					router: *router,
					quoter: *quoter,
					token_address_path: token_address_path.clone(),
					path_amounts,
				};
				return Ok((outputs, fill_data));
			}
			FillData::UniswapV2 { .. } if sell => {
				Sampler::sampleSellsFromUniswapV2Call::abi_decode_returns(data, true)?.makerTokenAmounts
			}
			FillData::UniswapV2 { .. } => {
				Sampler::sampleBuysFromUniswapV2Call::abi_decode_returns(data, true)?.takerTokenAmounts
			}
			FillData::Curve { .. } if sell => {
				Sampler::sampleSellsFromCurveCall::abi_decode_returns(data, true)?.makerTokenAmounts
			}
			FillData::Curve { .. } => {
				Sampler::sampleBuysFromCurveCall::abi_decode_returns(data, true)?.takerTokenAmounts
			}
			FillData::Balancer { .. } if sell => {
				Sampler::sampleSellsFromBalancerCall::abi_decode_returns(data, true)?.makerTokenAmounts
			}
			FillData::Balancer { .. } => {
				Sampler::sampleBuysFromBalancerCall::abi_decode_returns(data, true)?.takerTokenAmounts
			}
			FillData::LiquidityProvider { .. } if sell => {
				Sampler::sampleSellsFromLiquidityProviderCall::abi_decode_returns(data, true)?
					.makerTokenAmounts
			}
			FillData::LiquidityProvider { .. } => {
				Sampler::sampleBuysFromLiquidityProviderCall::abi_decode_returns(data, true)?
					.takerTokenAmounts
			}
			FillData::Native(_) | FillData::MultiHop { .. } => Vec::new(),
		};
		Ok((outputs, self.fill_data.clone()))
	}

	/// Turns a sub-call result into samples. Failures yield no samples.
	pub fn decode(&self, result: &CallResult) -> Vec<Sample> {
		if !result.success {
			debug!(source = %self.source, "Sampler sub-call reverted");
			return Vec::new();
		}
		match self.decode_outputs(&result.data) {
			Ok((outputs, fill_data)) => self
				.amounts
				.iter()
				.zip(outputs)
				.map(|(input, output)| Sample {
					source: self.source,
					input: *input,
					output,
					fill_data: fill_data.clone(),
				})
				.collect(),
			Err(e) => {
				debug!(source = %self.source, error = %e, "Failed to decode sampler result");
				Vec::new()
			}
		}
	}
}

/// A two-hop sampling query through one intermediate token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoHopQuery {
	pub side: MarketOperation,
	pub taker_token: Address,
	pub maker_token: Address,
	pub intermediate_token: Address,
	/// Candidate first legs, taker token to intermediate.
	pub first_hops: Vec<DexQuery>,
	/// Candidate second legs, intermediate to maker token.
	pub second_hops: Vec<DexQuery>,
	pub amount: U256,
}

impl TwoHopQuery {
	pub fn encode(&self) -> Option<Bytes> {
		let encode_hops = |hops: &[DexQuery]| -> Vec<Bytes> {
			hops.iter()
				.filter_map(|q| q.with_amounts(vec![U256::ZERO]).encode())
				.collect()
		};
		let first = encode_hops(&self.first_hops);
		let second = encode_hops(&self.second_hops);
		if first.is_empty() || second.is_empty() {
			return None;
		}
		let data = match self.side {
			MarketOperation::Sell => Sampler::sampleTwoHopSellCall {
				firstHopCalls: first,
				secondHopCalls: second,
				sellAmount: self.amount,
			}
			.abi_encode(),
			MarketOperation::Buy => Sampler::sampleTwoHopBuyCall {
				firstHopCalls: first,
				secondHopCalls: second,
				buyAmount: self.amount,
			}
			.abi_encode(),
		};
		Some(Bytes::from(data))
	}

	fn hop_source(hops: &[DexQuery], hop: &abi::HopInfo) -> Option<HopSource> {
		if hop.sourceIndex >= U256::from(hops.len()) {
			return None;
		}
		let query = &hops[hop.sourceIndex.as_limbs()[0] as usize];
		let fill_data = match &query.fill_data {
			// Keep the encoded path the sampler actually quoted.
			FillData::UniswapV3 { .. } => {
				let single = query.with_amounts(vec![U256::MAX]);
				single
					.decode_outputs(&hop.returnData)
					.map(|(_, fill_data)| fill_data)
					.unwrap_or_else(|_| query.fill_data.clone())
			}
			other => other.clone(),
		};
		Some(HopSource {
			source: query.source,
			fill_data: Box::new(fill_data),
		})
	}

	/// Decodes the chosen route into a multi-hop sample, if one was found.
	pub fn decode(&self, result: &CallResult) -> Option<Sample> {
		if !result.success {
			return None;
		}
		let (first_hop, second_hop, output) = match self.side {
			MarketOperation::Sell => {
				let r = Sampler::sampleTwoHopSellCall::abi_decode_returns(&result.data, true).ok()?;
				if r.buyAmount.is_zero() {
					return None;
				}
				(r.firstHop, r.secondHop, r.buyAmount)
			}
			MarketOperation::Buy => {
				let r = Sampler::sampleTwoHopBuyCall::abi_decode_returns(&result.data, true).ok()?;
				if r.sellAmount == U256::MAX {
					return None;
				}
				(r.firstHop, r.secondHop, r.sellAmount)
			}
		};

		Some(Sample {
			source: LiquiditySource::MultiHop,
			input: self.amount,
			output,
			fill_data: FillData::MultiHop {
				first_hop: Self::hop_source(&self.first_hops, &first_hop)?,
				second_hop: Self::hop_source(&self.second_hops, &second_hop)?,
				intermediate_token: self.intermediate_token,
			},
		})
	}
}

/// A single read in a sampler batch.
#[derive(Debug, Clone)]
pub enum BatchOperation {
	BlockNumber,
	TokenDecimals(Vec<Address>),
	/// Remaining fillable taker amounts of limit orders as seen by the exchange.
	LimitOrderFillableTakerAmounts {
		orders: Vec<(LimitOrder, Signature)>,
		exchange: Address,
	},
	/// Remaining fillable maker amounts of limit orders as seen by the exchange.
	LimitOrderFillableMakerAmounts {
		orders: Vec<(LimitOrder, Signature)>,
		exchange: Address,
	},
	DexQuotes(DexQuery),
	TwoHopQuote(TwoHopQuery),
	/// Best amount of `token` one ether buys across the given queries.
	NativeTokenRate {
		token: Address,
		queries: Vec<DexQuery>,
	},
}

/// Decoded result of a [`BatchOperation`], in the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
	BlockNumber(u64),
	TokenDecimals(Vec<u8>),
	FillableTakerAmounts(Vec<U256>),
	FillableMakerAmounts(Vec<U256>),
	Samples(Vec<Sample>),
	TwoHop(Option<Sample>),
	NativeTokenRate(U256),
}

impl BatchResult {
	pub fn block_number(&self) -> Option<u64> {
		match self {
			BatchResult::BlockNumber(n) => Some(*n),
			_ => None,
		}
	}

	pub fn into_samples(self) -> Vec<Sample> {
		match self {
			BatchResult::Samples(s) => s,
			_ => Vec::new(),
		}
	}

	pub fn into_two_hop(self) -> Option<Sample> {
		match self {
			BatchResult::TwoHop(s) => s,
			_ => None,
		}
	}

	pub fn into_fillable_amounts(self) -> Vec<U256> {
		match self {
			BatchResult::FillableTakerAmounts(a) | BatchResult::FillableMakerAmounts(a) => a,
			_ => Vec::new(),
		}
	}

	pub fn native_token_rate(&self) -> U256 {
		match self {
			BatchResult::NativeTokenRate(r) => *r,
			_ => U256::ZERO,
		}
	}

	pub fn token_decimals(&self) -> Vec<u8> {
		match self {
			BatchResult::TokenDecimals(d) => d.clone(),
			_ => Vec::new(),
		}
	}
}

fn to_abi_order(order: &LimitOrder) -> abi::LimitOrder {
	abi::LimitOrder {
		makerToken: order.maker_token,
		takerToken: order.taker_token,
		makerAmount: order.maker_amount,
		takerAmount: order.taker_amount,
		takerTokenFeeAmount: order.taker_token_fee_amount,
		maker: order.maker,
		taker: order.taker,
		sender: order.sender,
		feeRecipient: order.fee_recipient,
		pool: order.pool,
		expiry: order.expiry,
		salt: order.salt,
	}
}

fn to_abi_signature(signature: &Signature) -> abi::Signature {
	abi::Signature {
		signatureType: signature.signature_type as u8,
		v: signature.v,
		r: signature.r,
		s: signature.s,
	}
}

/// Without a usable reading, nothing is considered fillable.
fn fillable_or_zero(amounts: Option<Vec<U256>>, order_count: usize) -> Vec<U256> {
	amounts
		.filter(|a| a.len() == order_count)
		.unwrap_or_else(|| vec![U256::ZERO; order_count])
}

impl BatchOperation {
	/// Encodes the sub-calls this operation needs; may be none.
	fn encode(&self) -> Vec<Bytes> {
		match self {
			BatchOperation::BlockNumber => {
				vec![Bytes::from(Sampler::getBlockNumberCall {}.abi_encode())]
			}
			BatchOperation::TokenDecimals(tokens) if tokens.is_empty() => Vec::new(),
			BatchOperation::TokenDecimals(tokens) => vec![Bytes::from(
				Sampler::getTokenDecimalsCall {
					tokens: tokens.clone(),
				}
				.abi_encode(),
			)],
			BatchOperation::LimitOrderFillableTakerAmounts { orders, .. }
			| BatchOperation::LimitOrderFillableMakerAmounts { orders, .. }
				if orders.is_empty() =>
			{
				Vec::new()
			}
			BatchOperation::LimitOrderFillableTakerAmounts { orders, exchange } => {
				vec![Bytes::from(
					Sampler::getLimitOrderFillableTakerAssetAmountsCall {
						orders: orders.iter().map(|(o, _)| to_abi_order(o)).collect(),
						orderSignatures: orders.iter().map(|(_, s)| to_abi_signature(s)).collect(),
						exchange: *exchange,
					}
					.abi_encode(),
				)]
			}
			BatchOperation::LimitOrderFillableMakerAmounts { orders, exchange } => {
				vec![Bytes::from(
					Sampler::getLimitOrderFillableMakerAssetAmountsCall {
						orders: orders.iter().map(|(o, _)| to_abi_order(o)).collect(),
						orderSignatures: orders.iter().map(|(_, s)| to_abi_signature(s)).collect(),
						exchange: *exchange,
					}
					.abi_encode(),
				)]
			}
			BatchOperation::DexQuotes(query) => query.encode().into_iter().collect(),
			BatchOperation::TwoHopQuote(query) => query.encode().into_iter().collect(),
			BatchOperation::NativeTokenRate { queries, .. } => {
				queries.iter().filter_map(|q| q.encode()).collect()
			}
		}
	}

	/// Decodes this operation's slice of the batch results.
	fn decode(&self, results: &[CallResult]) -> BatchResult {
		match self {
			BatchOperation::BlockNumber => BatchResult::BlockNumber(
				results
					.first()
					.filter(|r| r.success)
					.and_then(|r| Sampler::getBlockNumberCall::abi_decode_returns(&r.data, true).ok())
					.map(|r| r.blockNumber.saturating_to::<u64>())
					.unwrap_or(0),
			),
			BatchOperation::TokenDecimals(_) => BatchResult::TokenDecimals(
				results
					.first()
					.filter(|r| r.success)
					.and_then(|r| Sampler::getTokenDecimalsCall::abi_decode_returns(&r.data, true).ok())
					.map(|r| r.decimals.iter().map(|d| d.saturating_to::<u8>()).collect())
					.unwrap_or_default(),
			),
			BatchOperation::LimitOrderFillableTakerAmounts { orders, .. } => {
				let amounts = results
					.first()
					.filter(|r| r.success)
					.and_then(|r| {
						Sampler::getLimitOrderFillableTakerAssetAmountsCall::abi_decode_returns(
							&r.data, true,
						)
						.ok()
					})
					.map(|r| r.orderFillableTakerAssetAmounts);
				BatchResult::FillableTakerAmounts(fillable_or_zero(amounts, orders.len()))
			}
			BatchOperation::LimitOrderFillableMakerAmounts { orders, .. } => {
				let amounts = results
					.first()
					.filter(|r| r.success)
					.and_then(|r| {
						Sampler::getLimitOrderFillableMakerAssetAmountsCall::abi_decode_returns(
							&r.data, true,
						)
						.ok()
					})
					.map(|r| r.orderFillableMakerAssetAmounts);
				BatchResult::FillableMakerAmounts(fillable_or_zero(amounts, orders.len()))
			}
			BatchOperation::DexQuotes(query) => BatchResult::Samples(
				results.first().map(|r| query.decode(r)).unwrap_or_default(),
			),
			BatchOperation::TwoHopQuote(query) => {
				BatchResult::TwoHop(results.first().and_then(|r| query.decode(r)))
			}
			BatchOperation::NativeTokenRate { queries, .. } if queries.is_empty() => {
				BatchResult::NativeTokenRate(ONE_ETHER)
			}
			BatchOperation::NativeTokenRate { queries, .. } => {
				let encodable = queries.iter().filter(|q| q.encode().is_some());
				let best = encodable
					.zip(results)
					.filter_map(|(q, r)| q.decode(r).first().map(|s| s.output))
					.max()
					.unwrap_or(U256::ZERO);
				BatchResult::NativeTokenRate(best)
			}
		}
	}
}

/// Builds sampler queries for the configured sources and executes them in batches.
pub struct DexOrderSampler {
	backend: Arc<dyn SamplerInterface>,
	sources: SourcesConfig,
}

impl DexOrderSampler {
	pub fn new(backend: Arc<dyn SamplerInterface>, sources: SourcesConfig) -> Self {
		Self { backend, sources }
	}

	pub fn sources(&self) -> &SourcesConfig {
		&self.sources
	}

	/// Queries for every configured source path of a pair, Balancer excluded.
	///
	/// With `include_weth_routes`, UniswapV2-style sources also get a path
	/// routed through WETH as a separate source path.
	fn pair_queries(
		&self,
		side: MarketOperation,
		filters: &SourceFilters,
		taker_token: Address,
		maker_token: Address,
		amounts: &[U256],
		include_weth_routes: bool,
	) -> Vec<DexQuery> {
		let mut queries = Vec::new();
		let weth = self.sources.weth;
		let mut paths = vec![vec![taker_token, maker_token]];
		if include_weth_routes && taker_token != weth && maker_token != weth {
			paths.push(vec![taker_token, weth, maker_token]);
		}

		let query = |source, fill_data| DexQuery {
			side,
			source,
			fill_data,
			taker_token,
			maker_token,
			amounts: amounts.to_vec(),
		};

		let v2_routers = [
			(LiquiditySource::UniswapV2, self.sources.uniswap_v2_router),
			(LiquiditySource::SushiSwap, self.sources.sushiswap_router),
			(LiquiditySource::PancakeSwap, self.sources.pancakeswap_router),
		];
		for (source, router) in v2_routers {
			let Some(router) = router.filter(|_| filters.is_allowed(source)) else {
				continue;
			};
			for path in &paths {
				queries.push(query(
					source,
					FillData::UniswapV2 {
						router,
						token_address_path: path.clone(),
					},
				));
			}
		}

		if let Some(v3) = self
			.sources
			.uniswap_v3
			.filter(|_| filters.is_allowed(LiquiditySource::UniswapV3))
		{
			for path in &paths {
				queries.push(query(
					LiquiditySource::UniswapV3,
					FillData::UniswapV3 {
						router: v3.router,
						quoter: v3.quoter,
						token_address_path: path.clone(),
						path_amounts: Vec::new(),
					},
				));
			}
		}

		if filters.is_allowed(LiquiditySource::Curve) {
			for pool in &self.sources.curve_pools {
				let from = pool.tokens.iter().position(|t| *t == taker_token);
				let to = pool.tokens.iter().position(|t| *t == maker_token);
				if let (Some(from), Some(to)) = (from, to) {
					queries.push(query(
						LiquiditySource::Curve,
						FillData::Curve {
							pool: pool.clone(),
							from_token_idx: from as u8,
							to_token_idx: to as u8,
						},
					));
				}
			}
		}

		if filters.is_allowed(LiquiditySource::LiquidityProvider) {
			for provider in &self.sources.liquidity_providers {
				if provider.tokens.contains(&taker_token) && provider.tokens.contains(&maker_token) {
					queries.push(query(
						LiquiditySource::LiquidityProvider,
						FillData::LiquidityProvider {
							pool_address: provider.address,
							gas_cost: provider.gas_cost,
						},
					));
				}
			}
		}

		queries
	}

	/// Queries for every source path that trades the pair directly or via WETH.
	pub fn dex_queries(
		&self,
		side: MarketOperation,
		filters: &SourceFilters,
		taker_token: Address,
		maker_token: Address,
		amounts: &[U256],
	) -> Vec<DexQuery> {
		self.pair_queries(side, filters, taker_token, maker_token, amounts, true)
	}

	/// On-chain queries for the given Balancer pools.
	pub fn balancer_queries(
		&self,
		side: MarketOperation,
		pool_addresses: &[Address],
		taker_token: Address,
		maker_token: Address,
		amounts: &[U256],
	) -> Vec<DexQuery> {
		pool_addresses
			.iter()
			.map(|pool_address| DexQuery {
				side,
				source: LiquiditySource::Balancer,
				fill_data: FillData::Balancer {
					pool_address: *pool_address,
				},
				taker_token,
				maker_token,
				amounts: amounts.to_vec(),
			})
			.collect()
	}

	/// One two-hop query per intermediate token of the pair.
	pub fn two_hop_queries(
		&self,
		side: MarketOperation,
		filters: &SourceFilters,
		taker_token: Address,
		maker_token: Address,
		amount: U256,
	) -> Vec<TwoHopQuery> {
		if !filters.is_allowed(LiquiditySource::MultiHop) {
			return Vec::new();
		}
		let hop_queries = |from, to| -> Vec<DexQuery> {
			self.pair_queries(side, filters, from, to, &[U256::ZERO], false)
				.into_iter()
				.filter(|q| q.source.is_hop_source())
				.collect()
		};

		self.sources
			.token_adjacency
			.intermediate_tokens(taker_token, maker_token)
			.into_iter()
			.map(|intermediate_token| TwoHopQuery {
				side,
				taker_token,
				maker_token,
				intermediate_token,
				first_hops: hop_queries(taker_token, intermediate_token),
				second_hops: hop_queries(intermediate_token, maker_token),
				amount,
			})
			.filter(|q| !q.first_hops.is_empty() && !q.second_hops.is_empty())
			.collect()
	}

	/// Rate of `token` per whole ether, read from the best DEX route out of WETH.
	pub fn native_token_rate_operation(
		&self,
		filters: &SourceFilters,
		token: Address,
	) -> BatchOperation {
		let queries = if token == self.sources.weth {
			Vec::new()
		} else {
			self.pair_queries(
				MarketOperation::Sell,
				filters,
				self.sources.weth,
				token,
				&[ONE_ETHER],
				false,
			)
		};
		BatchOperation::NativeTokenRate { token, queries }
	}

	/// Runs all operations in a single `batchCall` and returns results in order.
	pub async fn execute_batch(
		&self,
		operations: &[BatchOperation],
	) -> Result<Vec<BatchResult>, SamplerError> {
		let encoded: Vec<Vec<Bytes>> = operations.iter().map(|op| op.encode()).collect();
		let calls: Vec<Bytes> = encoded.iter().flatten().cloned().collect();
		let call_count = calls.len();

		let results = if calls.is_empty() {
			Vec::new()
		} else {
			self.backend.batch_call(calls).await?
		};
		if results.len() != call_count {
			return Err(SamplerError::Decode(format!(
				"expected {} call results, got {}",
				call_count,
				results.len()
			)));
		}

		let mut offset = 0;
		let decoded = operations
			.iter()
			.zip(encoded)
			.map(|(op, calls)| {
				let slice = &results[offset..offset + calls.len()];
				offset += calls.len();
				op.decode(slice)
			})
			.collect();
		Ok(decoded)
	}

	/// Samples selling `amounts` of `taker_token` on every configured source.
	pub async fn get_sell_quotes(
		&self,
		filters: &SourceFilters,
		maker_token: Address,
		taker_token: Address,
		amounts: &[U256],
	) -> Result<Vec<Vec<Sample>>, SamplerError> {
		self.get_quotes(MarketOperation::Sell, filters, maker_token, taker_token, amounts)
			.await
	}

	/// Samples buying `amounts` of `maker_token` on every configured source.
	pub async fn get_buy_quotes(
		&self,
		filters: &SourceFilters,
		maker_token: Address,
		taker_token: Address,
		amounts: &[U256],
	) -> Result<Vec<Vec<Sample>>, SamplerError> {
		self.get_quotes(MarketOperation::Buy, filters, maker_token, taker_token, amounts)
			.await
	}

	async fn get_quotes(
		&self,
		side: MarketOperation,
		filters: &SourceFilters,
		maker_token: Address,
		taker_token: Address,
		amounts: &[U256],
	) -> Result<Vec<Vec<Sample>>, SamplerError> {
		let operations: Vec<BatchOperation> = self
			.dex_queries(side, filters, taker_token, maker_token, amounts)
			.into_iter()
			.map(BatchOperation::DexQuotes)
			.collect();
		Ok(self
			.execute_batch(&operations)
			.await?
			.into_iter()
			.map(BatchResult::into_samples)
			.collect())
	}

	/// Samples weighted pools locally, one sample array per pool.
	pub fn sample_pools_off_chain(
		side: MarketOperation,
		source: LiquiditySource,
		pools: &[Pool],
		taker_token: Address,
		maker_token: Address,
		amounts: &[U256],
	) -> Vec<Vec<Sample>> {
		pools
			.iter()
			.map(|pool| {
				amounts
					.iter()
					.map(|amount| Sample {
						source,
						input: *amount,
						output: match side {
							MarketOperation::Sell => swapper_pools::balancer_math::out_given_in(
								pool,
								taker_token,
								maker_token,
								*amount,
							),
							MarketOperation::Buy => swapper_pools::balancer_math::in_given_out(
								pool,
								taker_token,
								maker_token,
								*amount,
							),
						},
						fill_data: FillData::Balancer {
							pool_address: pool.id,
						},
					})
					.collect()
			})
			.collect()
	}
}
