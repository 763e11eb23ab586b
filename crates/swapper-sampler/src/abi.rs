//! ABI of the on-chain `ERC20BridgeSampler` contract.

use alloy_sol_types::sol;

sol! {
	/// Result of one sub-call of `batchCall`.
	#[derive(Debug, PartialEq, Eq)]
	struct CallResults {
		bytes data;
		bool success;
	}

	/// Pool and quote selectors of a Curve-style pool.
	struct CurveInfo {
		address poolAddress;
		bytes4 sellQuoteFunctionSelector;
		bytes4 buyQuoteFunctionSelector;
	}

	/// The hop chosen by a two-hop sample and its raw return data.
	#[derive(Debug)]
	struct HopInfo {
		uint256 sourceIndex;
		bytes returnData;
	}

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

	struct Signature {
		uint8 signatureType;
		uint8 v;
		bytes32 r;
		bytes32 s;
	}

	interface IERC20BridgeSampler {
		function batchCall(bytes[] callDatas) external returns (CallResults[] callResults);

		function getBlockNumber() external view returns (uint256 blockNumber);

		function getTokenDecimals(address[] tokens) external view returns (uint256[] decimals);

		function getLimitOrderFillableTakerAssetAmounts(
			LimitOrder[] orders,
			Signature[] orderSignatures,
			address exchange
		) external view returns (uint256[] orderFillableTakerAssetAmounts);

		function getLimitOrderFillableMakerAssetAmounts(
			LimitOrder[] orders,
			Signature[] orderSignatures,
			address exchange
		) external view returns (uint256[] orderFillableMakerAssetAmounts);

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

		function sampleSellsFromUniswapV3(
			address quoter,
			address[] path,
			uint256[] takerTokenAmounts
		) external returns (bytes[] uniswapPaths, uint256[] uniswapGasUsed, uint256[] makerTokenAmounts);

		function sampleBuysFromUniswapV3(
			address quoter,
			address[] path,
			uint256[] makerTokenAmounts
		) external returns (bytes[] uniswapPaths, uint256[] uniswapGasUsed, uint256[] takerTokenAmounts);

		function sampleSellsFromCurve(
			CurveInfo curveInfo,
			int128 fromTokenIdx,
			int128 toTokenIdx,
			uint256[] takerTokenAmounts
		) external view returns (uint256[] makerTokenAmounts);

		function sampleBuysFromCurve(
			CurveInfo curveInfo,
			int128 fromTokenIdx,
			int128 toTokenIdx,
			uint256[] makerTokenAmounts
		) external view returns (uint256[] takerTokenAmounts);

		function sampleSellsFromBalancer(
			address poolAddress,
			address takerToken,
			address makerToken,
			uint256[] takerTokenAmounts
		) external view returns (uint256[] makerTokenAmounts);

		function sampleBuysFromBalancer(
			address poolAddress,
			address takerToken,
			address makerToken,
			uint256[] makerTokenAmounts
		) external view returns (uint256[] takerTokenAmounts);

		function sampleSellsFromLiquidityProvider(
			address providerAddress,
			address takerToken,
			address makerToken,
			uint256[] takerTokenAmounts
		) external view returns (uint256[] makerTokenAmounts);

		function sampleBuysFromLiquidityProvider(
			address providerAddress,
			address takerToken,
			address makerToken,
			uint256[] makerTokenAmounts
		) external view returns (uint256[] takerTokenAmounts);

		function sampleTwoHopSell(
			bytes[] firstHopCalls,
			bytes[] secondHopCalls,
			uint256 sellAmount
		) external returns (HopInfo firstHop, HopInfo secondHop, uint256 buyAmount);

		function sampleTwoHopBuy(
			bytes[] firstHopCalls,
			bytes[] secondHopCalls,
			uint256 buyAmount
		) external returns (HopInfo firstHop, HopInfo secondHop, uint256 sellAmount);
	}
}
