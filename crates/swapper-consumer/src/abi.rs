//! Solidity types and entry points of the 0x exchange proxy.
//!
//! Covers the `transformERC20` feature, the VIP direct swaps, the Multiplex
//! batch and multi-hop sells, and the data structs each transformer decodes.

use alloy_sol_types::sol;

sol! {
	/// Native limit order as stored by the exchange proxy.
	#[derive(Debug, PartialEq)]
	struct LimitOrder {
		address makerToken;
		address takerToken;
		uint128 makerAmount;
		uint128 takerAmount;
		uint128 takerTokenFeeAmount;
		address maker;
		address taker;
		address sender;
		address feeRecipient;
		bytes32 pool;
		uint64 expiry;
		uint256 salt;
	}

	/// Native RFQ order as stored by the exchange proxy.
	#[derive(Debug, PartialEq)]
	struct RfqOrder {
		address makerToken;
		address takerToken;
		uint128 makerAmount;
		uint128 takerAmount;
		address maker;
		address taker;
		address txOrigin;
		bytes32 pool;
		uint64 expiry;
		uint256 salt;
	}

	#[derive(Debug, PartialEq)]
	struct Signature {
		uint8 signatureType;
		uint8 v;
		bytes32 r;
		bytes32 s;
	}

	/// A DEX fill routed through a bridge adapter.
	#[derive(Debug, PartialEq)]
	struct BridgeOrder {
		bytes32 source;
		uint256 takerTokenAmount;
		uint256 makerTokenAmount;
		bytes bridgeData;
	}

	#[derive(Debug, PartialEq)]
	struct LimitOrderInfo {
		LimitOrder order;
		Signature signature;
		uint256 maxTakerTokenFillAmount;
	}

	#[derive(Debug, PartialEq)]
	struct RfqOrderInfo {
		RfqOrder order;
		Signature signature;
		uint256 maxTakerTokenFillAmount;
	}

	/// Payload of the FillQuoteTransformer.
	///
	/// `fillSequence` lists the order type of each fill, consumed in order
	/// from the three order arrays.
	#[derive(Debug, PartialEq)]
	struct FillQuoteTransformData {
		uint8 side;
		address sellToken;
		address buyToken;
		BridgeOrder[] bridgeOrders;
		LimitOrderInfo[] limitOrders;
		RfqOrderInfo[] rfqOrders;
		uint8[] fillSequence;
		uint256 fillAmount;
		address refundReceiver;
	}

	#[derive(Debug, PartialEq)]
	struct WethTransformData {
		address token;
		uint256 amount;
	}

	/// Tokens the PayTakerTransformer sends back; empty amounts mean "all".
	#[derive(Debug, PartialEq)]
	struct PayTakerTransformData {
		address[] tokens;
		uint256[] amounts;
	}

	#[derive(Debug, PartialEq)]
	struct TokenFee {
		address token;
		uint256 amount;
		address recipient;
	}

	#[derive(Debug, PartialEq)]
	struct AffiliateFeeTransformData {
		TokenFee[] fees;
	}

	#[derive(Debug, PartialEq)]
	struct PositiveSlippageFeeTransformData {
		address token;
		uint256 bestCaseAmount;
		address recipient;
	}

	/// One stage of a `transformERC20` call.
	#[derive(Debug, PartialEq)]
	struct Transformation {
		uint32 deploymentNonce;
		bytes data;
	}

	#[derive(Debug, PartialEq)]
	struct BatchSellSubcall {
		uint8 id;
		uint256 sellAmount;
		bytes data;
	}

	#[derive(Debug, PartialEq)]
	struct MultiHopSellSubcall {
		uint8 id;
		bytes data;
	}

	/// Entry points of the exchange proxy used for swaps.
	interface IZeroEx {
		function transformERC20(
			address inputToken,
			address outputToken,
			uint256 inputTokenAmount,
			uint256 minOutputTokenAmount,
			Transformation[] transformations
		) external payable returns (uint256 outputTokenAmount);

		function sellToUniswap(
			address[] tokens,
			uint256 sellAmount,
			uint256 minBuyAmount,
			bool isSushi
		) external payable returns (uint256 buyAmount);

		function sellEthForTokenToUniswapV3(
			bytes encodedPath,
			uint256 minBuyAmount,
			address recipient
		) external payable returns (uint256 buyAmount);

		function sellTokenForEthToUniswapV3(
			bytes encodedPath,
			uint256 sellAmount,
			uint256 minBuyAmount,
			address recipient
		) external returns (uint256 buyAmount);

		function sellTokenForTokenToUniswapV3(
			bytes encodedPath,
			uint256 sellAmount,
			uint256 minBuyAmount,
			address recipient
		) external returns (uint256 buyAmount);

		function sellToPancakeSwap(
			address[] tokens,
			uint256 sellAmount,
			uint256 minBuyAmount,
			uint8 fork
		) external payable returns (uint256 buyAmount);

		function sellToLiquidityProvider(
			address inputToken,
			address outputToken,
			address provider,
			address recipient,
			uint256 sellAmount,
			uint256 minBuyAmount,
			bytes auxiliaryData
		) external payable returns (uint256 boughtAmount);

		function fillRfqOrder(
			RfqOrder order,
			Signature signature,
			uint128 takerTokenFillAmount
		) external returns (uint128 takerTokenFilledAmount, uint128 makerTokenFilledAmount);

		function batchFillRfqOrders(
			RfqOrder[] orders,
			Signature[] signatures,
			uint128[] takerTokenFillAmounts,
			bool revertIfIncomplete
		) external returns (uint128[] takerTokenFilledAmounts, uint128[] makerTokenFilledAmounts);

		function multiplexBatchSellEthForToken(
			address outputToken,
			BatchSellSubcall[] calls,
			uint256 minBuyAmount
		) external payable returns (uint256 boughtAmount);

		function multiplexBatchSellTokenForEth(
			address inputToken,
			BatchSellSubcall[] calls,
			uint256 sellAmount,
			uint256 minBuyAmount
		) external returns (uint256 boughtAmount);

		function multiplexBatchSellTokenForToken(
			address inputToken,
			address outputToken,
			BatchSellSubcall[] calls,
			uint256 sellAmount,
			uint256 minBuyAmount
		) external returns (uint256 boughtAmount);

		function multiplexMultiHopSellEthForToken(
			address[] tokens,
			MultiHopSellSubcall[] calls,
			uint256 minBuyAmount
		) external payable returns (uint256 boughtAmount);

		function multiplexMultiHopSellTokenForEth(
			address[] tokens,
			MultiHopSellSubcall[] calls,
			uint256 sellAmount,
			uint256 minBuyAmount
		) external returns (uint256 boughtAmount);

		function multiplexMultiHopSellTokenForToken(
			address[] tokens,
			MultiHopSellSubcall[] calls,
			uint256 sellAmount,
			uint256 minBuyAmount
		) external returns (uint256 boughtAmount);
	}
}

impl From<&swapper_types::LimitOrder> for LimitOrder {
	fn from(order: &swapper_types::LimitOrder) -> Self {
		LimitOrder {
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
}

impl From<&swapper_types::RfqOrder> for RfqOrder {
	fn from(order: &swapper_types::RfqOrder) -> Self {
		RfqOrder {
			makerToken: order.maker_token,
			takerToken: order.taker_token,
			makerAmount: order.maker_amount,
			takerAmount: order.taker_amount,
			maker: order.maker,
			taker: order.taker,
			txOrigin: order.tx_origin,
			pool: order.pool,
			expiry: order.expiry,
			salt: order.salt,
		}
	}
}

impl From<&swapper_types::Signature> for Signature {
	fn from(signature: &swapper_types::Signature) -> Self {
		Signature {
			signatureType: signature.signature_type as u8,
			v: signature.v,
			r: signature.r,
			s: signature.s,
		}
	}
}
