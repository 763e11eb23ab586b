//! Optimized paths and the orders they settle as.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use swapper_types::{
	Fill, FillData, FillSummary, FillType, LiquiditySource, MarketOperation, OptimizedOrder,
	SourceFlags, MAX_UINT256,
};

use crate::rate::{decimal_fraction, mul_div, Rate};
use crate::OptimizerError;

/// An ordered set of fills that together cover (or try to cover) a target input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
	pub side: MarketOperation,
	pub target_input: U256,
	/// Collapsed fills, one per source path, in first-use order.
	pub fills: Vec<Fill>,
}

impl Path {
	pub fn new(side: MarketOperation, target_input: U256, fills: Vec<Fill>) -> Self {
		Self {
			side,
			target_input,
			fills,
		}
	}

	pub fn input(&self) -> U256 {
		self.fills.iter().fold(U256::ZERO, |acc, f| acc.saturating_add(f.input))
	}

	pub fn output(&self) -> U256 {
		self.fills.iter().fold(U256::ZERO, |acc, f| acc.saturating_add(f.output))
	}

	pub fn adjusted_output(&self) -> U256 {
		self.fills
			.iter()
			.fold(U256::ZERO, |acc, f| acc.saturating_add(f.adjusted_output))
	}

	pub fn gas(&self) -> u64 {
		self.fills.iter().map(|f| f.gas).sum()
	}

	pub fn source_flags(&self) -> SourceFlags {
		self.fills
			.iter()
			.fold(SourceFlags::empty(), |acc, f| acc | f.flags)
	}

	pub fn is_complete(&self) -> bool {
		!self.fills.is_empty() && self.input() >= self.target_input
	}

	/// True when the path is a single two-hop route.
	pub fn is_two_hop(&self) -> bool {
		self.fills.len() == 1 && self.fills[0].source == LiquiditySource::MultiHop
	}

	/// Unadjusted output per unit of input.
	pub fn rate(&self) -> Rate {
		Rate::new(self.output(), self.input())
	}

	/// Adjusted rate after charging `overhead` output units once for the whole path.
	pub fn adjusted_rate(&self, overhead: U256) -> Rate {
		let adjusted = match self.side {
			MarketOperation::Sell => self.adjusted_output().saturating_sub(overhead),
			MarketOperation::Buy => self.adjusted_output().saturating_add(overhead),
		};
		Rate::new(adjusted, self.input())
	}

	/// Whether this path should be preferred over `other`.
	///
	/// An incomplete path on either side makes input coverage decide;
	/// between complete paths the better overhead-adjusted rate wins.
	pub fn is_adjusted_better_than(
		&self,
		other: &Path,
		overhead: &dyn Fn(SourceFlags) -> U256,
	) -> bool {
		if !self.is_complete() || !other.is_complete() {
			return self.input() > other.input();
		}
		let ours = self.adjusted_rate(overhead(self.source_flags()));
		let theirs = other.adjusted_rate(overhead(other.source_flags()));
		ours.cmp_for(&theirs, self.side).is_gt()
	}

	/// Settlement orders for this path. A two-hop fill becomes two orders
	/// through its intermediate token.
	pub fn create_orders(&self, maker_token: Address, taker_token: Address) -> Vec<OptimizedOrder> {
		let mut orders = Vec::with_capacity(self.fills.len() + 1);
		for fill in &self.fills {
			let summary = FillSummary {
				input: fill.input,
				output: fill.output,
				adjusted_output: fill.adjusted_output,
				gas: fill.gas,
			};
			if let FillData::MultiHop {
				first_hop,
				second_hop,
				intermediate_token,
			} = &fill.fill_data
			{
				let (first, second) = match self.side {
					MarketOperation::Sell => ((U256::ZERO, fill.input), (fill.output, MAX_UINT256)),
					MarketOperation::Buy => ((U256::ZERO, fill.output), (fill.input, MAX_UINT256)),
				};
				orders.push(OptimizedOrder {
					fill_type: FillType::Bridge,
					source: first_hop.source,
					maker_token: *intermediate_token,
					taker_token,
					maker_amount: first.0,
					taker_amount: first.1,
					fill_data: (*first_hop.fill_data).clone(),
					fill: summary.clone(),
				});
				orders.push(OptimizedOrder {
					fill_type: FillType::Bridge,
					source: second_hop.source,
					maker_token,
					taker_token: *intermediate_token,
					maker_amount: second.0,
					taker_amount: second.1,
					fill_data: (*second_hop.fill_data).clone(),
					fill: summary,
				});
				continue;
			}

			let (maker_amount, taker_amount) = match self.side {
				MarketOperation::Sell => (fill.output, fill.input),
				MarketOperation::Buy => (fill.input, fill.output),
			};
			orders.push(OptimizedOrder {
				fill_type: fill.fill_type,
				source: fill.source,
				maker_token,
				taker_token,
				maker_amount,
				taker_amount,
				fill_data: fill.fill_data.clone(),
				fill: summary,
			});
		}
		orders
	}
}

/// Applies `slippage` to bridge orders: sells accept `floor(maker × (1 − s))`,
/// buys pay up to `ceil(taker × (1 + s))`.
///
/// Native orders settle at their signed price and are returned unchanged, as
/// are `MAX_UINT256` placeholder amounts.
pub fn get_slipped_orders(
	orders: &[OptimizedOrder],
	side: MarketOperation,
	slippage: Decimal,
) -> Result<Vec<OptimizedOrder>, OptimizerError> {
	let (numerator, denominator) =
		decimal_fraction(slippage).ok_or(OptimizerError::InvalidSlippage(slippage))?;

	Ok(orders
		.iter()
		.map(|order| {
			if order.fill_type != FillType::Bridge {
				return order.clone();
			}
			let mut slipped = order.clone();
			match side {
				MarketOperation::Sell if order.maker_amount != MAX_UINT256 => {
					slipped.maker_amount =
						mul_div(order.maker_amount, denominator - numerator, denominator, false);
				}
				MarketOperation::Buy if order.taker_amount != MAX_UINT256 => {
					slipped.taker_amount = mul_div(
						order.taker_amount,
						denominator.saturating_add(numerator),
						denominator,
						true,
					);
				}
				_ => {}
			}
			slipped
		})
		.collect())
}
