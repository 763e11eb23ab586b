//! The exchange proxy quote consumer.
//!
//! Routes are tried in a fixed order and the first compatible one wins: the
//! VIP direct swaps, the Multiplex batch sell, the Multiplex multi-hop sell
//! and finally `transformERC20`, which can settle any quote.

use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use swapper_optimizer::get_slipped_orders;
use swapper_types::{
	chain_id, FillData, FillType, LiquiditySource, MarketOperation, NativeOrder, OptimizedOrder, SwapQuote,
	ETH_TOKEN_ADDRESS, MAX_UINT256, NULL_ADDRESS, ONE_ETHER,
};
use tracing::debug;

use crate::abi::{self, IZeroEx};
use crate::bridge::encode_curve_liquidity_provider_data;
use crate::multiplex;
use crate::transformers::{
	encode_affiliate_fee_transformer_data, encode_fill_quote_transformer_data,
	encode_pay_taker_transformer_data, encode_positive_slippage_fee_transformer_data,
	encode_weth_transformer_data, fill_quote_transform_data, TransformerNonces,
};
use crate::ConsumerError;

/// Gas the positive slippage fee transformer adds to a swap.
pub const POSITIVE_SLIPPAGE_FEE_TRANSFORMER_GAS: u64 = 30_000;

/// Curve liquidity provider sandbox on mainnet.
pub const CURVE_LIQUIDITY_PROVIDER_MAINNET: Address = address!("561b94454b65614ae3db0897b74303f4acf7cc75");

/// UniswapV2 forks accepted by `sellToPancakeSwap`, in on-chain fork order.
const PANCAKE_SWAP_FORKS: [&str; 6] = [
	"PancakeSwap",
	"PancakeSwapV2",
	"BakerySwap",
	"SushiSwap",
	"ApeSwap",
	"CheeseSwap",
];

/// Addresses of the transformers deployed behind the exchange proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformerAddresses {
	pub weth_transformer: Address,
	pub pay_taker_transformer: Address,
	pub fill_quote_transformer: Address,
	pub affiliate_fee_transformer: Address,
	pub positive_slippage_fee_transformer: Address,
}

/// Deployed contracts the consumer encodes against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
	pub exchange_proxy: Address,
	pub transformer_deployer: Address,
	/// Wrapped native token (WETH on mainnet).
	pub ether_token: Address,
	/// Curve liquidity provider sandbox; mainnet defaults to the known deployment.
	#[serde(default)]
	pub curve_liquidity_provider: Option<Address>,
	pub transformers: TransformerAddresses,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffiliateFeeType {
	#[default]
	None,
	PercentageFee,
	PositiveSlippageFee,
	GaslessFee,
}

/// Fee an integrator takes from the swap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateFee {
	pub fee_type: AffiliateFeeType,
	pub recipient: Address,
	pub buy_token_fee_amount: U256,
	pub sell_token_fee_amount: U256,
}

/// Per-call encoding options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalldataOpts {
	pub is_from_eth: bool,
	pub is_to_eth: bool,
	pub is_meta_transaction: bool,
	pub should_sell_entire_balance: bool,
	/// Receives unspent protocol fees; the null address refunds the sender.
	pub refund_receiver: Address,
	pub affiliate_fee: AffiliateFee,
}

impl CalldataOpts {
	/// Whether the swap can only be expressed as a `transformERC20` call.
	pub fn requires_transform_erc20(&self) -> bool {
		self.is_meta_transaction
			|| self.should_sell_entire_balance
			|| !self.affiliate_fee.buy_token_fee_amount.is_zero()
			|| !self.affiliate_fee.sell_token_fee_amount.is_zero()
	}
}

/// The transaction to submit for a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalldataInfo {
	pub calldata_hex_string: String,
	/// Native value to attach to the call.
	pub eth_amount: U256,
	pub to_address: Address,
	pub allowance_target: Address,
	pub gas_overhead: u64,
}

/// Bounds shared by every route.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SwapAmounts {
	pub sell_amount: U256,
	pub min_buy_amount: U256,
}

/// Encodes swap quotes into exchange proxy calldata.
pub struct ExchangeProxySwapQuoteConsumer {
	chain_id: u64,
	contract_addresses: ContractAddresses,
	transformer_nonces: TransformerNonces,
}

impl ExchangeProxySwapQuoteConsumer {
	pub fn new(chain_id: u64, mut contract_addresses: ContractAddresses) -> Result<Self, ConsumerError> {
		let transformer_nonces = TransformerNonces::resolve(
			&contract_addresses.transformers,
			contract_addresses.transformer_deployer,
		)?;
		if contract_addresses.curve_liquidity_provider.is_none() && chain_id == chain_id::MAINNET {
			contract_addresses.curve_liquidity_provider = Some(CURVE_LIQUIDITY_PROVIDER_MAINNET);
		}
		debug!(chain_id, ?transformer_nonces, "Resolved transformer nonces");
		Ok(Self {
			chain_id,
			contract_addresses,
			transformer_nonces,
		})
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn transformer_nonces(&self) -> &TransformerNonces {
		&self.transformer_nonces
	}

	/// Encodes `quote` into the call a taker submits to the exchange proxy.
	pub fn get_calldata(&self, quote: &SwapQuote, opts: &CalldataOpts) -> Result<CalldataInfo, ConsumerError> {
		if !opts.affiliate_fee.sell_token_fee_amount.is_zero() {
			return Err(ConsumerError::UnsupportedFee);
		}

		let best = &quote.best_case_quote_info;
		let worst = &quote.worst_case_quote_info;
		let sell_amount = best.total_taker_amount.max(worst.total_taker_amount);
		let mut eth_amount = worst.protocol_fee_in_wei_amount;
		if opts.is_from_eth {
			eth_amount += sell_amount;
		}
		let amounts = SwapAmounts {
			sell_amount,
			min_buy_amount: worst.maker_amount,
		};

		let slipped = get_slipped_orders(&quote.orders, quote.side, worst.slippage)
			.map_err(|e| ConsumerError::InvalidQuote(e.to_string()))?;
		let requires_transform = opts.requires_transform_erc20();

		if !requires_transform {
			if let Some((route, calldata)) = self.vip_calldata(quote, opts, &slipped, &amounts)? {
				debug!(route, "Encoded VIP swap");
				let eth_amount = if opts.is_from_eth { sell_amount } else { U256::ZERO };
				return Ok(self.calldata_info(calldata, eth_amount, 0));
			}
		}

		if self.chain_id == chain_id::MAINNET && !requires_transform {
			if multiplex::is_batch_fill_compatible(quote, &slipped) {
				let calldata =
					multiplex::encode_batch_fill(quote, opts, &slipped, &amounts, &self.transformer_nonces)?;
				debug!("Encoded multiplex batch sell");
				return Ok(self.calldata_info(calldata, eth_amount, 0));
			}
			if multiplex::is_multi_hop_fill_compatible(quote, &slipped) {
				let calldata = multiplex::encode_multi_hop_fill(quote, opts, &slipped, &amounts)?;
				debug!("Encoded multiplex multi-hop sell");
				return Ok(self.calldata_info(calldata, eth_amount, 0));
			}
		}

		let (calldata, gas_overhead) = self.transform_erc20_calldata(quote, opts, &slipped, &amounts)?;
		debug!(gas_overhead, "Encoded transformERC20");
		Ok(self.calldata_info(calldata, eth_amount, gas_overhead))
	}

	fn calldata_info(&self, calldata: Vec<u8>, eth_amount: U256, gas_overhead: u64) -> CalldataInfo {
		CalldataInfo {
			calldata_hex_string: format!("0x{}", hex::encode(calldata)),
			eth_amount,
			to_address: self.contract_addresses.exchange_proxy,
			allowance_target: self.contract_addresses.exchange_proxy,
			gas_overhead,
		}
	}

	/// Tries each VIP route in turn, returning the route name and calldata
	/// of the first that applies.
	fn vip_calldata(
		&self,
		quote: &SwapQuote,
		opts: &CalldataOpts,
		orders: &[OptimizedOrder],
		amounts: &SwapAmounts,
	) -> Result<Option<(&'static str, Vec<u8>)>, ConsumerError> {
		let SwapAmounts {
			sell_amount,
			min_buy_amount,
			..
		} = *amounts;
		let input_token = if opts.is_from_eth { ETH_TOKEN_ADDRESS } else { quote.taker_token };
		let output_token = if opts.is_to_eth { ETH_TOKEN_ADDRESS } else { quote.maker_token };
		let single = match orders {
			[order] => Some(order),
			_ => None,
		};
		let mainnet = self.chain_id == chain_id::MAINNET;
		let bsc = self.chain_id == chain_id::BSC;

		if let Some(order) = single {
			match (&order.fill_data, order.source) {
				(
					FillData::UniswapV2 {
						token_address_path, ..
					},
					LiquiditySource::UniswapV2 | LiquiditySource::SushiSwap,
				) if mainnet => {
					let call = IZeroEx::sellToUniswapCall {
						tokens: eth_substituted_path(token_address_path, opts),
						sellAmount: sell_amount,
						minBuyAmount: min_buy_amount,
						isSushi: order.source == LiquiditySource::SushiSwap,
					};
					return Ok(Some(("sellToUniswap", call.abi_encode())));
				}
				(FillData::UniswapV3 { .. }, LiquiditySource::UniswapV3) if mainnet => {
					let path = order
						.fill_data
						.uniswap_v3_path_for(order.fill.input)
						.map(|p| p.uniswap_path.clone())
						.ok_or_else(|| ConsumerError::InvalidQuote("uniswap v3 order without a path".into()))?;
					let calldata = if opts.is_from_eth {
						IZeroEx::sellEthForTokenToUniswapV3Call {
							encodedPath: path,
							minBuyAmount: min_buy_amount,
							recipient: NULL_ADDRESS,
						}
						.abi_encode()
					} else if opts.is_to_eth {
						IZeroEx::sellTokenForEthToUniswapV3Call {
							encodedPath: path,
							sellAmount: sell_amount,
							minBuyAmount: min_buy_amount,
							recipient: NULL_ADDRESS,
						}
						.abi_encode()
					} else {
						IZeroEx::sellTokenForTokenToUniswapV3Call {
							encodedPath: path,
							sellAmount: sell_amount,
							minBuyAmount: min_buy_amount,
							recipient: NULL_ADDRESS,
						}
						.abi_encode()
					};
					return Ok(Some(("sellToUniswapV3", calldata)));
				}
				(
					FillData::UniswapV2 {
						token_address_path, ..
					},
					LiquiditySource::PancakeSwap | LiquiditySource::SushiSwap,
				) if bsc => {
					let fork = pancake_swap_fork(order.source)
						.ok_or(ConsumerError::UnsupportedSource(order.source))?;
					let call = IZeroEx::sellToPancakeSwapCall {
						tokens: eth_substituted_path(token_address_path, opts),
						sellAmount: sell_amount,
						minBuyAmount: min_buy_amount,
						fork,
					};
					return Ok(Some(("sellToPancakeSwap", call.abi_encode())));
				}
				(FillData::LiquidityProvider { pool_address, .. }, LiquiditySource::LiquidityProvider)
					if mainnet || bsc =>
				{
					let call = IZeroEx::sellToLiquidityProviderCall {
						inputToken: input_token,
						outputToken: output_token,
						provider: *pool_address,
						recipient: NULL_ADDRESS,
						sellAmount: sell_amount,
						minBuyAmount: min_buy_amount,
						auxiliaryData: Bytes::new(),
					};
					return Ok(Some(("sellToLiquidityProvider", call.abi_encode())));
				}
				(
					FillData::Curve {
						pool,
						from_token_idx,
						to_token_idx,
					},
					LiquiditySource::Curve,
				) if mainnet => {
					// The sandbox cannot wrap or unwrap around the trade.
					let touches_weth = quote.taker_token == self.contract_addresses.ether_token
						|| quote.maker_token == self.contract_addresses.ether_token;
					if let (false, Some(sandbox)) =
						(touches_weth, self.contract_addresses.curve_liquidity_provider)
					{
						let call = IZeroEx::sellToLiquidityProviderCall {
							inputToken: input_token,
							outputToken: output_token,
							provider: sandbox,
							recipient: NULL_ADDRESS,
							sellAmount: sell_amount,
							minBuyAmount: min_buy_amount,
							auxiliaryData: encode_curve_liquidity_provider_data(
								pool.pool_address,
								pool.exchange_function_selector,
								*from_token_idx,
								*to_token_idx,
							),
						};
						return Ok(Some(("sellToCurve", call.abi_encode())));
					}
				}
				_ => {}
			}
		}

		let rfq_chain = mainnet || self.chain_id == chain_id::POLYGON;
		if rfq_chain
			&& !opts.is_from_eth
			&& !opts.is_to_eth
			&& !orders.is_empty()
			&& orders.iter().all(|o| o.fill_type == FillType::Rfq)
		{
			return Ok(Some(("fillRfqOrder", rfq_vip_calldata(orders, sell_amount)?)));
		}
		Ok(None)
	}

	/// Encodes the catch-all `transformERC20` route, returning the calldata
	/// and the gas the fee transformer adds.
	fn transform_erc20_calldata(
		&self,
		quote: &SwapQuote,
		opts: &CalldataOpts,
		orders: &[OptimizedOrder],
		amounts: &SwapAmounts,
	) -> Result<(Vec<u8>, u64), ConsumerError> {
		let nonces = &self.transformer_nonces;
		let sell_token = quote.taker_token;
		let buy_token = quote.maker_token;
		let sell_entire_balance = opts.should_sell_entire_balance;
		let mut min_buy_amount = amounts.min_buy_amount;
		let mut gas_overhead = 0;
		let mut transformations = Vec::new();

		if opts.is_from_eth {
			let amount = if sell_entire_balance { MAX_UINT256 } else { amounts.sell_amount };
			transformations.push(abi::Transformation {
				deploymentNonce: nonces.weth_transformer,
				data: encode_weth_transformer_data(ETH_TOKEN_ADDRESS, amount),
			});
		}

		let intermediate_token = quote.intermediate_token();
		match (intermediate_token, orders) {
			(Some(intermediate), [first_hop, second_hop]) => {
				let first_fill = if sell_entire_balance { MAX_UINT256 } else { first_hop.taker_amount };
				let first = fill_quote_transform_data(
					MarketOperation::Sell,
					sell_token,
					intermediate,
					std::slice::from_ref(first_hop),
					first_fill,
					opts.refund_receiver,
				)?;
				let second = fill_quote_transform_data(
					MarketOperation::Sell,
					intermediate,
					buy_token,
					std::slice::from_ref(second_hop),
					MAX_UINT256,
					opts.refund_receiver,
				)?;
				for data in [first, second] {
					transformations.push(abi::Transformation {
						deploymentNonce: nonces.fill_quote_transformer,
						data: encode_fill_quote_transformer_data(&data),
					});
				}
			}
			(Some(_), _) => {
				return Err(ConsumerError::InvalidQuote(format!(
					"two-hop quote with {} orders",
					orders.len()
				)))
			}
			(None, _) => {
				let fallback = get_slipped_orders(
					&quote.fallback_orders,
					quote.side,
					quote.worst_case_quote_info.slippage,
				)
				.map_err(|e| ConsumerError::InvalidQuote(e.to_string()))?;
				let all_orders: Vec<OptimizedOrder> = orders.iter().cloned().chain(fallback).collect();
				let fill_amount = match quote.side {
					MarketOperation::Sell if sell_entire_balance => MAX_UINT256,
					_ => quote.fill_amount,
				};
				let data = fill_quote_transform_data(
					quote.side,
					sell_token,
					buy_token,
					&all_orders,
					fill_amount,
					opts.refund_receiver,
				)?;
				transformations.push(abi::Transformation {
					deploymentNonce: nonces.fill_quote_transformer,
					data: encode_fill_quote_transformer_data(&data),
				});
			}
		}

		if opts.is_to_eth {
			transformations.push(abi::Transformation {
				deploymentNonce: nonces.weth_transformer,
				data: encode_weth_transformer_data(self.contract_addresses.ether_token, MAX_UINT256),
			});
		}

		let fee = &opts.affiliate_fee;
		let fee_token = if opts.is_to_eth { ETH_TOKEN_ADDRESS } else { buy_token };
		if fee.recipient != NULL_ADDRESS {
			match fee.fee_type {
				AffiliateFeeType::PositiveSlippageFee => {
					let best_case_amount = positive_slippage_best_case_amount(quote);
					transformations.push(abi::Transformation {
						deploymentNonce: nonces.positive_slippage_fee_transformer,
						data: encode_positive_slippage_fee_transformer_data(
							fee_token,
							best_case_amount,
							fee.recipient,
						),
					});
					gas_overhead += POSITIVE_SLIPPAGE_FEE_TRANSFORMER_GAS;
				}
				AffiliateFeeType::PercentageFee | AffiliateFeeType::GaslessFee
					if !fee.buy_token_fee_amount.is_zero() =>
				{
					transformations.push(abi::Transformation {
						deploymentNonce: nonces.affiliate_fee_transformer,
						data: encode_affiliate_fee_transformer_data(vec![abi::TokenFee {
							token: fee_token,
							amount: fee.buy_token_fee_amount,
							recipient: fee.recipient,
						}]),
					});
					min_buy_amount = min_buy_amount.saturating_sub(fee.buy_token_fee_amount);
				}
				_ => {}
			}
		}

		let mut pay_taker_tokens = vec![sell_token];
		pay_taker_tokens.extend(intermediate_token);
		if !opts.is_to_eth {
			pay_taker_tokens.push(ETH_TOKEN_ADDRESS);
		}
		transformations.push(abi::Transformation {
			deploymentNonce: nonces.pay_taker_transformer,
			data: encode_pay_taker_transformer_data(pay_taker_tokens, vec![]),
		});

		let call = IZeroEx::transformERC20Call {
			inputToken: if opts.is_from_eth { ETH_TOKEN_ADDRESS } else { sell_token },
			outputToken: if opts.is_to_eth { ETH_TOKEN_ADDRESS } else { buy_token },
			inputTokenAmount: if sell_entire_balance { MAX_UINT256 } else { amounts.sell_amount },
			minOutputTokenAmount: min_buy_amount,
			transformations,
		};
		Ok((call.abi_encode(), gas_overhead))
	}
}

/// Replaces the first or last hop with the ETH placeholder when swapping
/// from or to the native asset.
fn eth_substituted_path(path: &[Address], opts: &CalldataOpts) -> Vec<Address> {
	let last = path.len().saturating_sub(1);
	path.iter()
		.enumerate()
		.map(|(i, token)| match i {
			0 if opts.is_from_eth => ETH_TOKEN_ADDRESS,
			i if i == last && opts.is_to_eth => ETH_TOKEN_ADDRESS,
			_ => *token,
		})
		.collect()
}

fn pancake_swap_fork(source: LiquiditySource) -> Option<u8> {
	let name = match source {
		LiquiditySource::PancakeSwap => "PancakeSwap",
		LiquiditySource::SushiSwap => "SushiSwap",
		_ => return None,
	};
	PANCAKE_SWAP_FORKS
		.iter()
		.position(|fork| *fork == name)
		.and_then(|i| u8::try_from(i).ok())
}

/// Fills each RFQ order for at most what is left of `sell_amount`.
fn rfq_vip_calldata(orders: &[OptimizedOrder], sell_amount: U256) -> Result<Vec<u8>, ConsumerError> {
	let mut remaining = sell_amount;
	let mut rfq_orders = Vec::with_capacity(orders.len());
	let mut signatures = Vec::with_capacity(orders.len());
	let mut fill_amounts = Vec::with_capacity(orders.len());
	for order in orders {
		let FillData::Native(native) = &order.fill_data else {
			return Err(ConsumerError::InvalidQuote("RFQ fill without a native order".into()));
		};
		let NativeOrder::Rfq(rfq) = &native.order else {
			return Err(ConsumerError::InvalidQuote("RFQ fill carries a limit order".into()));
		};
		let fill_amount = order.taker_amount.min(remaining);
		remaining -= fill_amount;
		rfq_orders.push(abi::RfqOrder::from(rfq));
		signatures.push(abi::Signature::from(&native.signature));
		fill_amounts.push(
			u128::try_from(fill_amount)
				.map_err(|_| ConsumerError::InvalidQuote("RFQ fill amount exceeds uint128".into()))?,
		);
	}

	if rfq_orders.len() == 1 {
		if let (Some(order), Some(signature), Some(amount)) =
			(rfq_orders.pop(), signatures.pop(), fill_amounts.pop())
		{
			return Ok(IZeroEx::fillRfqOrderCall {
				order,
				signature,
				takerTokenFillAmount: amount,
			}
			.abi_encode());
		}
	}
	Ok(IZeroEx::batchFillRfqOrdersCall {
		orders: rfq_orders,
		signatures,
		takerTokenFillAmounts: fill_amounts,
		revertIfIncomplete: true,
	}
	.abi_encode())
}

/// Best case buy amount plus the gas the fee transformer costs, in maker units.
fn positive_slippage_best_case_amount(quote: &SwapQuote) -> U256 {
	let best_maker = quote.best_case_quote_info.maker_amount;
	let gas_in_maker = U256::from(POSITIVE_SLIPPAGE_FEE_TRANSFORMER_GAS)
		.saturating_mul(quote.gas_price)
		.saturating_mul(quote.maker_amount_per_eth)
		/ ONE_ETHER;
	best_maker.saturating_add(gas_in_maker).max(best_maker)
}
