//! Transformer deployment nonces and transformer payloads.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolValue;
use swapper_types::{FillData, FillType, MarketOperation, NativeOrder, OptimizedOrder, NULL_ADDRESS};

use crate::abi;
use crate::bridge::{bridge_source_id, encode_bridge_data};
use crate::consumer::TransformerAddresses;
use crate::ConsumerError;

/// How many CREATE nonces of the deployer are searched for a transformer.
pub const MAX_NONCE_GUESSES: u32 = 1024;

/// Finds the CREATE nonce under which `deployer` deployed `transformer`.
///
/// A null deployer means transformers are addressed by nonce 0.
pub fn find_transformer_nonce(transformer: Address, deployer: Address) -> Result<u32, ConsumerError> {
	if deployer == NULL_ADDRESS {
		return Ok(0);
	}
	(0..MAX_NONCE_GUESSES)
		.find(|nonce| deployer.create(u64::from(*nonce)) == transformer)
		.ok_or(ConsumerError::UnknownTransformer {
			transformer,
			deployer,
		})
}

/// Deployment nonces of every transformer the encoder uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformerNonces {
	pub weth_transformer: u32,
	pub pay_taker_transformer: u32,
	pub fill_quote_transformer: u32,
	pub affiliate_fee_transformer: u32,
	pub positive_slippage_fee_transformer: u32,
}

impl TransformerNonces {
	pub fn resolve(transformers: &TransformerAddresses, deployer: Address) -> Result<Self, ConsumerError> {
		Ok(Self {
			weth_transformer: find_transformer_nonce(transformers.weth_transformer, deployer)?,
			pay_taker_transformer: find_transformer_nonce(transformers.pay_taker_transformer, deployer)?,
			fill_quote_transformer: find_transformer_nonce(transformers.fill_quote_transformer, deployer)?,
			affiliate_fee_transformer: find_transformer_nonce(
				transformers.affiliate_fee_transformer,
				deployer,
			)?,
			positive_slippage_fee_transformer: find_transformer_nonce(
				transformers.positive_slippage_fee_transformer,
				deployer,
			)?,
		})
	}
}

/// On-chain `Side` of the FillQuoteTransformer.
fn fill_quote_side(side: MarketOperation) -> u8 {
	match side {
		MarketOperation::Sell => 0,
		MarketOperation::Buy => 1,
	}
}

/// Splits `orders` into the bridge, limit and RFQ arrays of a FillQuoteTransformer
/// payload, recording the fill sequence.
pub fn fill_quote_transform_data(
	side: MarketOperation,
	sell_token: Address,
	buy_token: Address,
	orders: &[OptimizedOrder],
	fill_amount: U256,
	refund_receiver: Address,
) -> Result<abi::FillQuoteTransformData, ConsumerError> {
	let mut bridge_orders = Vec::new();
	let mut limit_orders = Vec::new();
	let mut rfq_orders = Vec::new();
	let mut fill_sequence = Vec::with_capacity(orders.len());

	for order in orders {
		match (order.fill_type, &order.fill_data) {
			(FillType::Bridge, _) => bridge_orders.push(abi::BridgeOrder {
				source: bridge_source_id(order.source)?,
				takerTokenAmount: order.taker_amount,
				makerTokenAmount: order.maker_amount,
				bridgeData: encode_bridge_data(order)?,
			}),
			(FillType::Limit, FillData::Native(native)) => match &native.order {
				NativeOrder::Limit(limit) => limit_orders.push(abi::LimitOrderInfo {
					order: limit.into(),
					signature: (&native.signature).into(),
					maxTakerTokenFillAmount: order.taker_amount,
				}),
				NativeOrder::Rfq(_) => {
					return Err(ConsumerError::InvalidQuote("limit fill carries an RFQ order".into()))
				}
			},
			(FillType::Rfq, FillData::Native(native)) => match &native.order {
				NativeOrder::Rfq(rfq) => rfq_orders.push(abi::RfqOrderInfo {
					order: rfq.into(),
					signature: (&native.signature).into(),
					maxTakerTokenFillAmount: order.taker_amount,
				}),
				NativeOrder::Limit(_) => {
					return Err(ConsumerError::InvalidQuote("RFQ fill carries a limit order".into()))
				}
			},
			(fill_type, _) => {
				return Err(ConsumerError::InvalidQuote(format!(
					"{:?} fill without a native order",
					fill_type
				)))
			}
		}
		fill_sequence.push(order.fill_type as u8);
	}

	Ok(abi::FillQuoteTransformData {
		side: fill_quote_side(side),
		sellToken: sell_token,
		buyToken: buy_token,
		bridgeOrders: bridge_orders,
		limitOrders: limit_orders,
		rfqOrders: rfq_orders,
		fillSequence: fill_sequence,
		fillAmount: fill_amount,
		refundReceiver: refund_receiver,
	})
}

pub fn encode_fill_quote_transformer_data(data: &abi::FillQuoteTransformData) -> Bytes {
	Bytes::from(data.abi_encode())
}

pub fn encode_weth_transformer_data(token: Address, amount: U256) -> Bytes {
	Bytes::from(abi::WethTransformData { token, amount }.abi_encode())
}

pub fn encode_pay_taker_transformer_data(tokens: Vec<Address>, amounts: Vec<U256>) -> Bytes {
	Bytes::from(abi::PayTakerTransformData { tokens, amounts }.abi_encode())
}

pub fn encode_affiliate_fee_transformer_data(fees: Vec<abi::TokenFee>) -> Bytes {
	Bytes::from(abi::AffiliateFeeTransformData { fees }.abi_encode())
}

pub fn encode_positive_slippage_fee_transformer_data(
	token: Address,
	best_case_amount: U256,
	recipient: Address,
) -> Bytes {
	Bytes::from(
		abi::PositiveSlippageFeeTransformData {
			token,
			bestCaseAmount: best_case_amount,
			recipient,
		}
		.abi_encode(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::B256;
	use swapper_types::{FillSummary, LiquiditySource, NativeOrderWithFillableAmounts, RfqOrder, Signature, SignatureType};

	#[test]
	fn test_find_transformer_nonce() {
		let deployer = Address::repeat_byte(0x39);
		let transformer = deployer.create(17);
		assert_eq!(find_transformer_nonce(transformer, deployer).unwrap(), 17);
		assert_eq!(find_transformer_nonce(transformer, NULL_ADDRESS).unwrap(), 0);

		let missing = deployer.create(u64::from(MAX_NONCE_GUESSES));
		assert!(matches!(
			find_transformer_nonce(missing, deployer),
			Err(ConsumerError::UnknownTransformer { .. })
		));
	}

	#[test]
	fn test_fill_sequence_follows_order_types() {
		let rfq = NativeOrderWithFillableAmounts::fully_fillable(
			NativeOrder::Rfq(RfqOrder {
				maker_token: Address::repeat_byte(2),
				taker_token: Address::repeat_byte(1),
				maker_amount: 300,
				taker_amount: 100,
				maker: Address::repeat_byte(9),
				taker: NULL_ADDRESS,
				tx_origin: Address::repeat_byte(8),
				pool: B256::ZERO,
				expiry: u64::MAX,
				salt: U256::from(1u64),
			}),
			Signature {
				signature_type: SignatureType::Eip712,
				v: 27,
				r: B256::repeat_byte(1),
				s: B256::repeat_byte(2),
			},
		);
		let summary = FillSummary {
			input: U256::from(100u64),
			output: U256::from(300u64),
			adjusted_output: U256::from(300u64),
			gas: 0,
		};
		let orders = vec![
			OptimizedOrder {
				fill_type: FillType::Rfq,
				source: LiquiditySource::Native,
				maker_token: Address::repeat_byte(2),
				taker_token: Address::repeat_byte(1),
				maker_amount: U256::from(300u64),
				taker_amount: U256::from(100u64),
				fill_data: FillData::Native(rfq),
				fill: summary.clone(),
			},
			OptimizedOrder {
				fill_type: FillType::Bridge,
				source: LiquiditySource::Balancer,
				maker_token: Address::repeat_byte(2),
				taker_token: Address::repeat_byte(1),
				maker_amount: U256::from(250u64),
				taker_amount: U256::from(100u64),
				fill_data: FillData::Balancer {
					pool_address: Address::repeat_byte(4),
				},
				fill: summary,
			},
		];

		let data = fill_quote_transform_data(
			MarketOperation::Sell,
			Address::repeat_byte(1),
			Address::repeat_byte(2),
			&orders,
			U256::from(200u64),
			NULL_ADDRESS,
		)
		.unwrap();
		assert_eq!(data.fillSequence, vec![2, 0]);
		assert_eq!(data.rfqOrders.len(), 1);
		assert_eq!(data.rfqOrders[0].signature.signatureType, 2);
		assert_eq!(data.bridgeOrders.len(), 1);
		assert!(data.limitOrders.is_empty());

		let encoded = encode_fill_quote_transformer_data(&data);
		let decoded = abi::FillQuoteTransformData::abi_decode(&encoded, true).unwrap();
		assert_eq!(decoded, data);
	}
}
