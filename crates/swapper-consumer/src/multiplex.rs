//! Multiplex batch and multi-hop sells.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use swapper_types::{
	FillData, FillType, LiquiditySource, MarketOperation, NativeOrder, OptimizedOrder, SwapQuote,
	MAX_UINT256, NULL_ADDRESS,
};

use crate::abi::{self, IZeroEx};
use crate::consumer::{CalldataOpts, SwapAmounts};
use crate::transformers::{
	encode_fill_quote_transformer_data, encode_pay_taker_transformer_data, fill_quote_transform_data,
	TransformerNonces,
};
use crate::ConsumerError;

/// Subcall ids understood by the Multiplex feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MultiplexSubcall {
	Invalid = 0,
	Rfq = 1,
	UniswapV2 = 2,
	UniswapV3 = 3,
	LiquidityProvider = 4,
	TransformERC20 = 5,
	BatchSell = 6,
	MultiHopSell = 7,
}

const BATCH_FILL_SOURCES: [LiquiditySource; 5] = [
	LiquiditySource::UniswapV2,
	LiquiditySource::SushiSwap,
	LiquiditySource::Native,
	LiquiditySource::UniswapV3,
	LiquiditySource::LiquidityProvider,
];

const MULTI_HOP_FILL_SOURCES: [LiquiditySource; 4] = [
	LiquiditySource::UniswapV2,
	LiquiditySource::SushiSwap,
	LiquiditySource::UniswapV3,
	LiquiditySource::LiquidityProvider,
];

/// A single-hop path of RFQ orders and batch-capable DEX fills.
pub fn is_batch_fill_compatible(quote: &SwapQuote, orders: &[OptimizedOrder]) -> bool {
	!quote.is_two_hop
		&& !orders.is_empty()
		&& orders
			.iter()
			.all(|o| o.fill_type != FillType::Limit && BATCH_FILL_SOURCES.contains(&o.source))
}

/// Exactly one two-hop route whose hops Multiplex can call directly.
pub fn is_multi_hop_fill_compatible(quote: &SwapQuote, orders: &[OptimizedOrder]) -> bool {
	quote.is_two_hop
		&& matches!(orders, [first, second]
			if [first, second]
				.iter()
				.all(|o| o.fill_type == FillType::Bridge && MULTI_HOP_FILL_SOURCES.contains(&o.source)))
}

fn uniswap_v3_path(order: &OptimizedOrder) -> Result<Bytes, ConsumerError> {
	order
		.fill_data
		.uniswap_v3_path_for(order.fill.input)
		.map(|p| p.uniswap_path.clone())
		.ok_or_else(|| ConsumerError::InvalidQuote("uniswap v3 order without a path".into()))
}

/// Builds the batch sell subcalls left to right.
///
/// The first order Multiplex cannot call directly starts a nested
/// `transformERC20` subcall that settles it and every order after it.
pub(crate) fn batch_sell_subcalls(
	quote: &SwapQuote,
	orders: &[OptimizedOrder],
	nonces: &TransformerNonces,
) -> Result<Vec<abi::BatchSellSubcall>, ConsumerError> {
	let mut subcalls = Vec::with_capacity(orders.len());
	for (i, order) in orders.iter().enumerate() {
		let subcall = match (&order.fill_data, order.source) {
			(FillData::Native(native), _) if order.fill_type == FillType::Rfq => {
				let NativeOrder::Rfq(rfq) = &native.order else {
					return Err(ConsumerError::InvalidQuote("RFQ fill carries a limit order".into()));
				};
				abi::BatchSellSubcall {
					id: MultiplexSubcall::Rfq as u8,
					sellAmount: order.taker_amount,
					data: Bytes::from(
						(abi::RfqOrder::from(rfq), abi::Signature::from(&native.signature)).abi_encode_params(),
					),
				}
			}
			(
				FillData::UniswapV2 {
					token_address_path, ..
				},
				LiquiditySource::UniswapV2 | LiquiditySource::SushiSwap,
			) => abi::BatchSellSubcall {
				id: MultiplexSubcall::UniswapV2 as u8,
				sellAmount: order.taker_amount,
				data: Bytes::from(
					(token_address_path.clone(), order.source == LiquiditySource::SushiSwap)
						.abi_encode_params(),
				),
			},
			(FillData::LiquidityProvider { pool_address, .. }, _) => abi::BatchSellSubcall {
				id: MultiplexSubcall::LiquidityProvider as u8,
				sellAmount: order.taker_amount,
				data: Bytes::from((*pool_address, Bytes::new()).abi_encode_params()),
			},
			(FillData::UniswapV3 { .. }, _) => abi::BatchSellSubcall {
				id: MultiplexSubcall::UniswapV3 as u8,
				sellAmount: order.taker_amount,
				data: uniswap_v3_path(order)?,
			},
			_ => {
				let remaining = &orders[i..];
				let fill_quote = fill_quote_transform_data(
					MarketOperation::Sell,
					quote.taker_token,
					quote.maker_token,
					remaining,
					MAX_UINT256,
					NULL_ADDRESS,
				)?;
				let transformations = vec![
					abi::Transformation {
						deploymentNonce: nonces.fill_quote_transformer,
						data: encode_fill_quote_transformer_data(&fill_quote),
					},
					abi::Transformation {
						deploymentNonce: nonces.pay_taker_transformer,
						data: encode_pay_taker_transformer_data(vec![quote.taker_token], vec![]),
					},
				];
				subcalls.push(abi::BatchSellSubcall {
					id: MultiplexSubcall::TransformERC20 as u8,
					sellAmount: remaining
						.iter()
						.fold(U256::ZERO, |sum, o| sum.saturating_add(o.taker_amount)),
					data: Bytes::from((transformations,).abi_encode_params()),
				});
				break;
			}
		};
		subcalls.push(subcall);
	}
	Ok(subcalls)
}

pub(crate) fn encode_batch_fill(
	quote: &SwapQuote,
	opts: &CalldataOpts,
	orders: &[OptimizedOrder],
	amounts: &SwapAmounts,
	nonces: &TransformerNonces,
) -> Result<Vec<u8>, ConsumerError> {
	let calls = batch_sell_subcalls(quote, orders, nonces)?;
	let sell_amount = quote.worst_case_quote_info.total_taker_amount;
	let min_buy_amount = amounts.min_buy_amount;
	let calldata = if opts.is_from_eth {
		IZeroEx::multiplexBatchSellEthForTokenCall {
			outputToken: quote.maker_token,
			calls,
			minBuyAmount: min_buy_amount,
		}
		.abi_encode()
	} else if opts.is_to_eth {
		IZeroEx::multiplexBatchSellTokenForEthCall {
			inputToken: quote.taker_token,
			calls,
			sellAmount: sell_amount,
			minBuyAmount: min_buy_amount,
		}
		.abi_encode()
	} else {
		IZeroEx::multiplexBatchSellTokenForTokenCall {
			inputToken: quote.taker_token,
			outputToken: quote.maker_token,
			calls,
			sellAmount: sell_amount,
			minBuyAmount: min_buy_amount,
		}
		.abi_encode()
	};
	Ok(calldata)
}

fn multi_hop_subcall(order: &OptimizedOrder) -> Result<abi::MultiHopSellSubcall, ConsumerError> {
	let subcall = match (&order.fill_data, order.source) {
		(
			FillData::UniswapV2 {
				token_address_path, ..
			},
			LiquiditySource::UniswapV2 | LiquiditySource::SushiSwap,
		) => abi::MultiHopSellSubcall {
			id: MultiplexSubcall::UniswapV2 as u8,
			data: Bytes::from(
				(token_address_path.clone(), order.source == LiquiditySource::SushiSwap).abi_encode_params(),
			),
		},
		(FillData::UniswapV3 { .. }, _) => abi::MultiHopSellSubcall {
			id: MultiplexSubcall::UniswapV3 as u8,
			data: uniswap_v3_path(order)?,
		},
		(FillData::LiquidityProvider { pool_address, .. }, _) => abi::MultiHopSellSubcall {
			id: MultiplexSubcall::LiquidityProvider as u8,
			data: Bytes::from((*pool_address, Bytes::new()).abi_encode_params()),
		},
		_ => return Err(ConsumerError::UnsupportedSource(order.source)),
	};
	Ok(subcall)
}

pub(crate) fn encode_multi_hop_fill(
	quote: &SwapQuote,
	opts: &CalldataOpts,
	orders: &[OptimizedOrder],
	amounts: &SwapAmounts,
) -> Result<Vec<u8>, ConsumerError> {
	let [first_hop, second_hop] = orders else {
		return Err(ConsumerError::InvalidQuote(format!(
			"multi-hop sell needs two orders, got {}",
			orders.len()
		)));
	};
	let tokens: Vec<Address> = vec![quote.taker_token, first_hop.maker_token, quote.maker_token];
	let calls = vec![multi_hop_subcall(first_hop)?, multi_hop_subcall(second_hop)?];
	let sell_amount = quote.worst_case_quote_info.total_taker_amount;
	let min_buy_amount = amounts.min_buy_amount;
	let calldata = if opts.is_from_eth {
		IZeroEx::multiplexMultiHopSellEthForTokenCall {
			tokens,
			calls,
			minBuyAmount: min_buy_amount,
		}
		.abi_encode()
	} else if opts.is_to_eth {
		IZeroEx::multiplexMultiHopSellTokenForEthCall {
			tokens,
			calls,
			sellAmount: sell_amount,
			minBuyAmount: min_buy_amount,
		}
		.abi_encode()
	} else {
		IZeroEx::multiplexMultiHopSellTokenForTokenCall {
			tokens,
			calls,
			sellAmount: sell_amount,
			minBuyAmount: min_buy_amount,
		}
		.abi_encode()
	};
	Ok(calldata)
}
