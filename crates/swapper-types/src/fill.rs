//! Samples, fills and the per-source fill data they carry.
//!
//! A [`Sample`] is a single observed price point. The fill normalizer turns
//! samples, native orders and RFQ quotes into uniform [`Fill`]s, which the
//! path optimizer ranks by `adjusted_output`.

use alloy_primitives::{Address, Bytes, FixedBytes, U256};
use serde::{Deserialize, Serialize};

use crate::{LiquiditySource, NativeOrderWithFillableAmounts, SourceFlags};

/// Settlement path a fill goes through inside the FillQuoteTransformer.
///
/// Discriminants match the on-chain `OrderType` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FillType {
	Bridge = 0,
	Limit = 1,
	Rfq = 2,
}

/// A Curve-style pool definition from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePool {
	pub pool_address: Address,
	pub tokens: Vec<Address>,
	pub exchange_function_selector: FixedBytes<4>,
	pub sell_quote_function_selector: FixedBytes<4>,
	pub buy_quote_function_selector: FixedBytes<4>,
	pub gas_schedule: u64,
}

/// One candidate encoded Uniswap V3 path with its sampled cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniswapV3PathAmount {
	pub uniswap_path: Bytes,
	pub input_amount: U256,
	pub gas_used: u64,
}

/// One leg of a multi-hop route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopSource {
	pub source: LiquiditySource,
	pub fill_data: Box<FillData>,
}

/// Source-specific data needed to settle a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FillData {
	/// A signed limit or RFQ order.
	Native(NativeOrderWithFillableAmounts),
	/// UniswapV2 and its forks (SushiSwap, PancakeSwap).
	UniswapV2 {
		router: Address,
		token_address_path: Vec<Address>,
	},
	UniswapV3 {
		router: Address,
		quoter: Address,
		token_address_path: Vec<Address>,
		path_amounts: Vec<UniswapV3PathAmount>,
	},
	Curve {
		pool: CurvePool,
		from_token_idx: u8,
		to_token_idx: u8,
	},
	Balancer {
		pool_address: Address,
	},
	LiquidityProvider {
		pool_address: Address,
		gas_cost: Option<u64>,
	},
	MultiHop {
		first_hop: HopSource,
		second_hop: HopSource,
		intermediate_token: Address,
	},
}

impl FillData {
	/// For Uniswap V3, returns the encoded path that covers `input`.
	///
	/// Picks the first sampled path whose input reaches `input`, falling back
	/// to the largest sampled path.
	pub fn uniswap_v3_path_for(&self, input: U256) -> Option<&UniswapV3PathAmount> {
		match self {
			FillData::UniswapV3 { path_amounts, .. } => path_amounts
				.iter()
				.find(|p| p.input_amount >= input)
				.or_else(|| path_amounts.last()),
			_ => None,
		}
	}
}

/// A single observed price point from a liquidity source.
///
/// Samples of one source path are index-aligned with the requested amounts.
/// Zero output means the source has no liquidity at this size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
	pub source: LiquiditySource,
	pub input: U256,
	pub output: U256,
	pub fill_data: FillData,
}

/// A normalized, rankable slice of liquidity.
///
/// `output` is what settlement delivers; `adjusted_output` is what the
/// optimizer ranks on after gas has been priced in. For sells the adjustment
/// never raises output and for buys it never lowers cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
	/// Fills sharing this id come from the same curve and collapse into one order.
	pub source_path_id: String,
	pub source: LiquiditySource,
	pub fill_type: FillType,
	pub input: U256,
	pub output: U256,
	pub adjusted_output: U256,
	pub fill_data: FillData,
	pub gas: u64,
	pub flags: SourceFlags,
}
