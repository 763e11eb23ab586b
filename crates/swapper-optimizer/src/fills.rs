//! Conversion of samples, native orders and two-hop samples into fills.
//!
//! A fill's `adjusted_output` prices in the gas its source costs, expressed
//! in output token units: sells lose output, buys pay more.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use swapper_types::{
	Fill, FillData, FillType, LiquiditySource, MarketOperation, NativeOrderWithFillableAmounts, Sample,
	SourceFlags, ONE_ETHER,
};

use crate::rate::mul_div;

/// Gas units each source costs to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
	pub native: u64,
	pub uniswap_v2: u64,
	/// Added per hop beyond the first on UniswapV2-style paths.
	pub uniswap_v2_extra_hop: u64,
	pub uniswap_v3_base: u64,
	pub balancer: u64,
	pub liquidity_provider: u64,
	pub multi_hop_overhead: u64,
}

impl Default for GasSchedule {
	fn default() -> Self {
		Self {
			native: 100_000,
			uniswap_v2: 90_000,
			uniswap_v2_extra_hop: 60_000,
			uniswap_v3_base: 34_000,
			balancer: 120_000,
			liquidity_provider: 100_000,
			multi_hop_overhead: 30_000,
		}
	}
}

impl GasSchedule {
	/// Gas of settling `fill_data` for `input`.
	pub fn gas(&self, fill_data: &FillData, input: U256) -> u64 {
		match fill_data {
			FillData::Native(_) => self.native,
			FillData::UniswapV2 {
				token_address_path, ..
			} => {
				let extra_hops = token_address_path.len().saturating_sub(2) as u64;
				self.uniswap_v2 + extra_hops * self.uniswap_v2_extra_hop
			}
			FillData::UniswapV3 { path_amounts, .. } => {
				let path_gas = fill_data
					.uniswap_v3_path_for(input)
					.map(|p| p.gas_used)
					.unwrap_or_else(|| median(path_amounts.iter().map(|p| p.gas_used).collect()));
				self.uniswap_v3_base + path_gas
			}
			FillData::Curve { pool, .. } => pool.gas_schedule,
			FillData::Balancer { .. } => self.balancer,
			FillData::LiquidityProvider { gas_cost, .. } => gas_cost.unwrap_or(self.liquidity_provider),
			FillData::MultiHop {
				first_hop,
				second_hop,
				..
			} => {
				self.gas(&first_hop.fill_data, U256::MAX)
					+ self.gas(&second_hop.fill_data, U256::MAX)
					+ self.multi_hop_overhead
			}
		}
	}
}

fn median(mut values: Vec<u64>) -> u64 {
	if values.is_empty() {
		return 0;
	}
	values.sort_unstable();
	values[values.len() / 2]
}

/// Prices used to turn gas into output token units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillOpts {
	/// Wei per gas unit.
	pub gas_price: U256,
	/// Input token base units one ether buys.
	pub input_amount_per_eth: U256,
	/// Output token base units one ether buys.
	pub output_amount_per_eth: U256,
	pub gas_schedule: GasSchedule,
}

impl FillOpts {
	fn penalty(&self, gas: u64, input: U256, output: U256) -> U256 {
		let eth_amount = self.gas_price.saturating_mul(U256::from(gas));
		eth_to_output_amount(
			input,
			output,
			eth_amount,
			self.input_amount_per_eth,
			self.output_amount_per_eth,
		)
	}
}

/// Converts `eth_amount` wei into output token units.
///
/// Uses the output token's ether rate when known, otherwise goes through the
/// input token's rate and the fill's own price. Without either rate the
/// result is zero and fills are ranked fee-blind.
pub fn eth_to_output_amount(
	input: U256,
	output: U256,
	eth_amount: U256,
	input_amount_per_eth: U256,
	output_amount_per_eth: U256,
) -> U256 {
	if !output_amount_per_eth.is_zero() {
		return mul_div(output_amount_per_eth, eth_amount, ONE_ETHER, false);
	}
	if !input_amount_per_eth.is_zero() && !input.is_zero() {
		let in_input_units = mul_div(input_amount_per_eth, eth_amount, ONE_ETHER, false);
		return mul_div(in_input_units, output, input, false);
	}
	U256::ZERO
}

fn adjust(side: MarketOperation, output: U256, penalty: U256) -> U256 {
	match side {
		MarketOperation::Sell => output.saturating_sub(penalty),
		MarketOperation::Buy => output.saturating_add(penalty),
	}
}

/// Identifies the curve a fill belongs to. Fills with the same id are
/// collapsed into a single order.
pub fn source_path_id(source: LiquiditySource, fill_data: &FillData) -> String {
	let join = |path: &[alloy_primitives::Address]| {
		path.iter()
			.map(|a| format!("{:#x}", a))
			.collect::<Vec<_>>()
			.join(">")
	};
	match fill_data {
		FillData::Native(o) => format!(
			"{}-{:#x}-{}-{}",
			source,
			o.order.maker(),
			o.order.salt(),
			if o.order.is_rfq() { "rfq" } else { "limit" }
		),
		FillData::UniswapV2 {
			router,
			token_address_path,
		} => format!("{}-{:#x}-{}", source, router, join(token_address_path)),
		FillData::UniswapV3 {
			router,
			token_address_path,
			..
		} => format!("{}-{:#x}-{}", source, router, join(token_address_path)),
		FillData::Curve {
			pool,
			from_token_idx,
			to_token_idx,
		} => format!(
			"{}-{:#x}-{}-{}",
			source, pool.pool_address, from_token_idx, to_token_idx
		),
		FillData::Balancer { pool_address } => format!("{}-{:#x}", source, pool_address),
		FillData::LiquidityProvider { pool_address, .. } => format!("{}-{:#x}", source, pool_address),
		FillData::MultiHop {
			first_hop,
			second_hop,
			intermediate_token,
		} => format!(
			"{}-{}-{:#x}-{}",
			source, first_hop.source, intermediate_token, second_hop.source
		),
	}
}

/// Cumulative fills of one sampled source path.
///
/// Sampling stops at the first zero output; later samples of a drained
/// source are not trusted.
pub fn dex_samples_to_fills(side: MarketOperation, samples: &[Sample], opts: &FillOpts) -> Vec<Fill> {
	let mut fills = Vec::with_capacity(samples.len());
	for sample in samples {
		if sample.output.is_zero() || sample.input.is_zero() {
			break;
		}
		let gas = opts.gas_schedule.gas(&sample.fill_data, sample.input);
		let penalty = opts.penalty(gas, sample.input, sample.output);
		fills.push(Fill {
			source_path_id: source_path_id(sample.source, &sample.fill_data),
			source: sample.source,
			fill_type: FillType::Bridge,
			input: sample.input,
			output: sample.output,
			adjusted_output: adjust(side, sample.output, penalty),
			fill_data: sample.fill_data.clone(),
			gas,
			flags: SourceFlags::from(sample.source),
		});
	}
	fills
}

/// One fill per fillable native order, clipped to `target_input`.
pub fn native_orders_to_fills(
	side: MarketOperation,
	orders: &[NativeOrderWithFillableAmounts],
	target_input: U256,
	opts: &FillOpts,
) -> Vec<Fill> {
	orders
		.iter()
		.filter_map(|order| {
			let taker_side = order
				.fillable_taker_amount
				.saturating_add(order.fillable_taker_fee_amount);
			let maker_side = order.fillable_maker_amount;
			let (mut input, mut output) = match side {
				MarketOperation::Sell => (taker_side, maker_side),
				MarketOperation::Buy => (maker_side, taker_side),
			};
			if input.is_zero() || output.is_zero() {
				return None;
			}
			if input > target_input {
				output = mul_div(output, target_input, input, side == MarketOperation::Buy);
				input = target_input;
			}
			if input.is_zero() || output.is_zero() {
				return None;
			}

			let fill_data = FillData::Native(order.clone());
			let gas = opts.gas_schedule.gas(&fill_data, input);
			let penalty = opts.penalty(gas, input, output);
			Some(Fill {
				source_path_id: source_path_id(LiquiditySource::Native, &fill_data),
				source: LiquiditySource::Native,
				fill_type: if order.order.is_rfq() {
					FillType::Rfq
				} else {
					FillType::Limit
				},
				input,
				output,
				adjusted_output: adjust(side, output, penalty),
				fill_data,
				gas,
				flags: SourceFlags::from(LiquiditySource::Native),
			})
		})
		.collect()
}

/// A single fill covering a whole two-hop route.
pub fn two_hop_sample_to_fill(side: MarketOperation, sample: &Sample, opts: &FillOpts) -> Fill {
	let mut flags = SourceFlags::from(LiquiditySource::MultiHop);
	if let FillData::MultiHop {
		first_hop,
		second_hop,
		..
	} = &sample.fill_data
	{
		flags.insert(first_hop.source);
		flags.insert(second_hop.source);
	}
	let gas = opts.gas_schedule.gas(&sample.fill_data, sample.input);
	let penalty = opts.penalty(gas, sample.input, sample.output);
	Fill {
		source_path_id: source_path_id(LiquiditySource::MultiHop, &sample.fill_data),
		source: LiquiditySource::MultiHop,
		fill_type: FillType::Bridge,
		input: sample.input,
		output: sample.output,
		adjusted_output: adjust(side, sample.output, penalty),
		fill_data: sample.fill_data.clone(),
		gas,
		flags,
	}
}
