//! Bridge source ids and per-source bridge data for the FillQuoteTransformer.

use alloy_primitives::{Address, Bytes, FixedBytes, B256};
use alloy_sol_types::SolValue;
use swapper_types::{FillData, LiquiditySource, OptimizedOrder};

use crate::ConsumerError;

/// Bridge adapter families known to the FillQuoteTransformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u128)]
pub enum BridgeProtocol {
	Unknown = 0,
	Curve = 1,
	UniswapV2 = 2,
	Balancer = 4,
	UniswapV3 = 18,
}

/// Builds `bytes32(uint128 protocol || name)` with the name right-padded.
pub fn encode_bridge_source_id(protocol: BridgeProtocol, name: &str) -> B256 {
	let mut id = [0u8; 32];
	id[..16].copy_from_slice(&(protocol as u128).to_be_bytes());
	let name = name.as_bytes();
	let len = name.len().min(16);
	id[16..16 + len].copy_from_slice(&name[..len]);
	B256::from(id)
}

/// Bridge source id of a DEX source.
pub fn bridge_source_id(source: LiquiditySource) -> Result<B256, ConsumerError> {
	let (protocol, name) = match source {
		LiquiditySource::UniswapV2 => (BridgeProtocol::UniswapV2, "UniswapV2"),
		LiquiditySource::SushiSwap => (BridgeProtocol::UniswapV2, "SushiSwap"),
		LiquiditySource::PancakeSwap => (BridgeProtocol::UniswapV2, "PancakeSwap"),
		LiquiditySource::UniswapV3 => (BridgeProtocol::UniswapV3, "UniswapV3"),
		LiquiditySource::Curve => (BridgeProtocol::Curve, "Curve"),
		LiquiditySource::Balancer => (BridgeProtocol::Balancer, "Balancer"),
		LiquiditySource::LiquidityProvider => (BridgeProtocol::Unknown, "LP"),
		LiquiditySource::Native | LiquiditySource::MultiHop => {
			return Err(ConsumerError::UnsupportedSource(source))
		}
	};
	Ok(encode_bridge_source_id(protocol, name))
}

/// Bridge data the adapter for `order.source` decodes.
pub fn encode_bridge_data(order: &OptimizedOrder) -> Result<Bytes, ConsumerError> {
	let data = match &order.fill_data {
		FillData::UniswapV2 {
			router,
			token_address_path,
		} => (*router, token_address_path.clone()).abi_encode_params(),
		FillData::UniswapV3 { router, .. } => {
			let path = order
				.fill_data
				.uniswap_v3_path_for(order.fill.input)
				.ok_or_else(|| ConsumerError::InvalidQuote("uniswap v3 order without a path".into()))?;
			(*router, path.uniswap_path.clone()).abi_encode_params()
		}
		FillData::Curve {
			pool,
			from_token_idx,
			to_token_idx,
		} => (
			pool.pool_address,
			pool.exchange_function_selector,
			i128::from(*from_token_idx),
			i128::from(*to_token_idx),
		)
			.abi_encode_params(),
		FillData::Balancer { pool_address } => pool_address.abi_encode(),
		FillData::LiquidityProvider { pool_address, .. } => {
			let aux = Bytes::from(order.taker_token.abi_encode());
			(*pool_address, aux).abi_encode_params()
		}
		FillData::Native(_) | FillData::MultiHop { .. } => {
			return Err(ConsumerError::UnsupportedSource(order.source))
		}
	};
	Ok(Bytes::from(data))
}

/// Auxiliary data for the Curve liquidity provider sandbox.
pub fn encode_curve_liquidity_provider_data(
	curve_address: Address,
	exchange_function_selector: FixedBytes<4>,
	from_coin_idx: u8,
	to_coin_idx: u8,
) -> Bytes {
	Bytes::from(
		(
			curve_address,
			exchange_function_selector,
			alloy_primitives::U256::from(from_coin_idx),
			alloy_primitives::U256::from(to_coin_idx),
		)
			.abi_encode_params(),
	)
}
