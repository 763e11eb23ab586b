//! Optimized orders and the swap quote assembled from them.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{FillData, FillType, LiquiditySource, MarketOperation, NativeOrder};

/// Amounts of the fill an order was collapsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillSummary {
	pub input: U256,
	pub output: U256,
	pub adjusted_output: U256,
	pub gas: u64,
}

/// A settlement-ready order produced from one or more fills of the same source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedOrder {
	pub fill_type: FillType,
	pub source: LiquiditySource,
	pub maker_token: Address,
	pub taker_token: Address,
	pub maker_amount: U256,
	pub taker_amount: U256,
	pub fill_data: FillData,
	pub fill: FillSummary,
}

impl OptimizedOrder {
	/// The native order behind this optimized order, if any.
	pub fn native_order(&self) -> Option<&NativeOrder> {
		match &self.fill_data {
			FillData::Native(o) => Some(&o.order),
			_ => None,
		}
	}
}

/// Amounts a quote settles at under one scenario (best or worst case).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInfo {
	pub maker_amount: U256,
	pub taker_amount: U256,
	/// Taker amount including any taker-side order fees.
	pub total_taker_amount: U256,
	pub protocol_fee_in_wei_amount: U256,
	pub gas: u64,
	pub slippage: Decimal,
}

/// Share of a quote routed through one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BreakdownEntry {
	Proportion(Decimal),
	#[serde(rename_all = "camelCase")]
	MultiHop {
		proportion: Decimal,
		intermediate_token: Address,
		hops: [LiquiditySource; 2],
	},
}

pub type SourceBreakdown = BTreeMap<LiquiditySource, BreakdownEntry>;

/// One line of the quote report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "camelCase")]
pub enum QuoteReportEntry {
	#[serde(rename_all = "camelCase")]
	Bridge {
		liquidity_source: LiquiditySource,
		maker_amount: U256,
		taker_amount: U256,
	},
	#[serde(rename_all = "camelCase")]
	MultiHop {
		maker_amount: U256,
		taker_amount: U256,
		hop_sources: Vec<LiquiditySource>,
	},
	#[serde(rename_all = "camelCase")]
	NativeLimitOrder {
		maker_amount: U256,
		taker_amount: U256,
		fillable_taker_amount: U256,
	},
	#[serde(rename_all = "camelCase")]
	NativeRfqOrder {
		maker_amount: U256,
		taker_amount: U256,
		fillable_taker_amount: U256,
		maker_uri: Option<String>,
		comparison_price: Option<Decimal>,
	},
}

/// Which sources were considered for a quote and which were delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteReport {
	pub sources_considered: Vec<QuoteReportEntry>,
	pub sources_delivered: Vec<QuoteReportEntry>,
}

/// A priced and routed market order, ready to be encoded into calldata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
	pub side: MarketOperation,
	pub maker_token: Address,
	pub taker_token: Address,
	/// Taker amount for sells, maker amount for buys.
	pub fill_amount: U256,
	pub orders: Vec<OptimizedOrder>,
	pub fallback_orders: Vec<OptimizedOrder>,
	pub is_two_hop: bool,
	pub best_case_quote_info: QuoteInfo,
	pub worst_case_quote_info: QuoteInfo,
	pub source_breakdown: SourceBreakdown,
	pub gas_price: U256,
	/// Maker token base units per whole ether.
	pub maker_amount_per_eth: U256,
	/// Taker token base units per whole ether.
	pub taker_amount_per_eth: U256,
	pub block_number: u64,
	pub quote_report: Option<QuoteReport>,
}

impl SwapQuote {
	pub fn taker_token_fill_amount(&self) -> Option<U256> {
		(self.side == MarketOperation::Sell).then_some(self.fill_amount)
	}

	pub fn maker_token_fill_amount(&self) -> Option<U256> {
		(self.side == MarketOperation::Buy).then_some(self.fill_amount)
	}

	/// The intermediate token of a two-hop quote.
	pub fn intermediate_token(&self) -> Option<Address> {
		if !self.is_two_hop {
			return None;
		}
		self.orders.first().map(|o| o.maker_token)
	}
}
