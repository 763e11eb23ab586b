//! Best and worst case amounts of a set of optimized orders.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use swapper_optimizer::{get_slipped_orders, mul_div, OptimizerError};
use swapper_types::{
	BreakdownEntry, FillData, LiquiditySource, MarketOperation, OptimizedOrder, QuoteInfo,
	SourceBreakdown, ONE_ETHER,
};

/// Inputs of a quote info calculation.
#[derive(Debug, Clone)]
pub struct QuoteInfoOpts {
	pub side: MarketOperation,
	/// Slippage of the worst case.
	pub slippage: Decimal,
	pub gas_price: U256,
	/// Gas units charged as protocol fee per limit order.
	pub protocol_fee_multiplier: U256,
	/// Gas of routing through the exchange proxy, added to both cases.
	pub overhead_gas: u64,
}

/// Both scenarios of a quote and how its input splits across sources.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteInfos {
	pub best_case: QuoteInfo,
	pub worst_case: QuoteInfo,
	pub source_breakdown: SourceBreakdown,
}

/// Computes best and worst case amounts for `orders`.
///
/// A single-hop quote sums its orders as is for the best case and its
/// slipped orders for the worst case. A two-hop quote takes its amounts from
/// the two hop orders.
pub fn calculate_quote_info(
	orders: &[OptimizedOrder],
	is_two_hop: bool,
	opts: &QuoteInfoOpts,
) -> Result<QuoteInfos, OptimizerError> {
	let slipped = get_slipped_orders(orders, opts.side, opts.slippage)?;
	match (is_two_hop, orders, slipped.as_slice()) {
		(true, [first, second], [slipped_first, slipped_second]) => Ok(two_hop_quote_info(
			(first, second),
			(slipped_first, slipped_second),
			opts,
		)),
		_ => Ok(QuoteInfos {
			best_case: sum_orders(orders, opts, Decimal::ZERO),
			worst_case: sum_orders(&slipped, opts, opts.slippage),
			source_breakdown: source_breakdown(orders),
		}),
	}
}

fn sum_orders(orders: &[OptimizedOrder], opts: &QuoteInfoOpts, slippage: Decimal) -> QuoteInfo {
	let mut maker_amount = U256::ZERO;
	let mut total_taker_amount = U256::ZERO;
	let mut fee_amount = U256::ZERO;
	let mut gas = opts.overhead_gas;
	let mut limit_orders = 0u64;

	for order in orders {
		maker_amount = maker_amount.saturating_add(order.maker_amount);
		total_taker_amount = total_taker_amount.saturating_add(order.taker_amount);
		gas = gas.saturating_add(order.fill.gas);
		if let FillData::Native(native) = &order.fill_data {
			if !native.order.is_rfq() {
				limit_orders += 1;
			}
			// Taker amounts of native orders include their share of the taker fee.
			let fillable = native
				.fillable_taker_amount
				.saturating_add(native.fillable_taker_fee_amount);
			fee_amount = fee_amount.saturating_add(mul_div(
				order.taker_amount,
				native.fillable_taker_fee_amount,
				fillable,
				false,
			));
		}
	}

	QuoteInfo {
		maker_amount,
		taker_amount: total_taker_amount.saturating_sub(fee_amount),
		total_taker_amount,
		protocol_fee_in_wei_amount: opts
			.protocol_fee_multiplier
			.saturating_mul(opts.gas_price)
			.saturating_mul(U256::from(limit_orders)),
		gas,
		slippage,
	}
}

fn two_hop_quote_info(
	(first, second): (&OptimizedOrder, &OptimizedOrder),
	(slipped_first, slipped_second): (&OptimizedOrder, &OptimizedOrder),
	opts: &QuoteInfoOpts,
) -> QuoteInfos {
	let fill = &first.fill;
	let gas = fill.gas.saturating_add(opts.overhead_gas);
	let info = |maker_amount: U256, taker_amount: U256, slippage: Decimal| QuoteInfo {
		maker_amount,
		taker_amount,
		total_taker_amount: taker_amount,
		protocol_fee_in_wei_amount: U256::ZERO,
		gas,
		slippage,
	};

	let (best_case, worst_case) = match opts.side {
		MarketOperation::Sell => (
			info(fill.output, fill.input, Decimal::ZERO),
			info(slipped_second.maker_amount, first.taker_amount, opts.slippage),
		),
		MarketOperation::Buy => (
			info(fill.input, fill.output, Decimal::ZERO),
			info(second.maker_amount, slipped_first.taker_amount, opts.slippage),
		),
	};

	let mut source_breakdown = SourceBreakdown::new();
	source_breakdown.insert(
		LiquiditySource::MultiHop,
		BreakdownEntry::MultiHop {
			proportion: Decimal::ONE,
			intermediate_token: first.maker_token,
			hops: [first.source, second.source],
		},
	);

	QuoteInfos {
		best_case,
		worst_case,
		source_breakdown,
	}
}

/// Share of the filled input routed through each source.
fn source_breakdown(orders: &[OptimizedOrder]) -> SourceBreakdown {
	let total = orders
		.iter()
		.fold(U256::ZERO, |acc, o| acc.saturating_add(o.fill.input));
	let mut by_source: std::collections::BTreeMap<LiquiditySource, U256> = Default::default();
	for order in orders {
		let entry = by_source.entry(order.source).or_default();
		*entry = entry.saturating_add(order.fill.input);
	}
	by_source
		.into_iter()
		.map(|(source, input)| (source, BreakdownEntry::Proportion(proportion(input, total))))
		.collect()
}

/// `part / total` with 18 decimal places.
fn proportion(part: U256, total: U256) -> Decimal {
	let scaled = mul_div(part, ONE_ETHER, total, false);
	u128::try_from(scaled)
		.ok()
		.and_then(|v| i128::try_from(v).ok())
		.and_then(|v| Decimal::try_from_i128_with_scale(v, 18).ok())
		.map(|d| d.normalize())
		.unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use alloy_primitives::{Address, B256};
	use swapper_types::{
		FillSummary, FillType, HopSource, LimitOrder, NativeOrder, NativeOrderWithFillableAmounts,
		Signature, SignatureType, MAX_UINT256,
	};

	const MAKER: Address = Address::repeat_byte(0x22);
	const TAKER: Address = Address::repeat_byte(0x11);

	fn opts(side: MarketOperation) -> QuoteInfoOpts {
		QuoteInfoOpts {
			side,
			slippage: Decimal::new(1, 2),
			gas_price: U256::from(10),
			protocol_fee_multiplier: U256::from(70_000),
			overhead_gas: 1_000,
		}
	}

	pub fn bridge_order(
		source: LiquiditySource,
		maker_amount: u64,
		taker_amount: u64,
		input: u64,
	) -> OptimizedOrder {
		OptimizedOrder {
			fill_type: FillType::Bridge,
			source,
			maker_token: MAKER,
			taker_token: TAKER,
			maker_amount: U256::from(maker_amount),
			taker_amount: U256::from(taker_amount),
			fill_data: FillData::Balancer {
				pool_address: Address::ZERO,
			},
			fill: FillSummary {
				input: U256::from(input),
				output: U256::ZERO,
				adjusted_output: U256::ZERO,
				gas: 90_000,
			},
		}
	}

	fn limit_order(maker_amount: u128, taker_amount: u128, fee: u128) -> OptimizedOrder {
		let order = LimitOrder {
			maker_token: MAKER,
			taker_token: TAKER,
			maker_amount,
			taker_amount,
			taker_token_fee_amount: fee,
			maker: Address::repeat_byte(9),
			taker: Address::ZERO,
			sender: Address::ZERO,
			fee_recipient: Address::ZERO,
			pool: B256::ZERO,
			expiry: u64::MAX,
			salt: U256::from(1),
		};
		let signature = Signature {
			signature_type: SignatureType::Eip712,
			v: 27,
			r: B256::ZERO,
			s: B256::ZERO,
		};
		OptimizedOrder {
			fill_type: FillType::Limit,
			source: LiquiditySource::Native,
			maker_token: MAKER,
			taker_token: TAKER,
			maker_amount: U256::from(maker_amount),
			taker_amount: U256::from(taker_amount + fee),
			fill_data: FillData::Native(NativeOrderWithFillableAmounts::fully_fillable(
				NativeOrder::Limit(order),
				signature,
			)),
			fill: FillSummary {
				input: U256::from(taker_amount + fee),
				output: U256::from(maker_amount),
				adjusted_output: U256::from(maker_amount),
				gas: 100_000,
			},
		}
	}

	#[test]
	fn test_single_hop_quote_info() {
		let orders = vec![
			bridge_order(LiquiditySource::UniswapV2, 2_000, 750, 750),
			limit_order(500, 240, 10),
		];
		let infos = calculate_quote_info(&orders, false, &opts(MarketOperation::Sell)).unwrap();

		assert_eq!(infos.best_case.maker_amount, U256::from(2_500));
		assert_eq!(infos.best_case.total_taker_amount, U256::from(1_000));
		assert_eq!(infos.best_case.taker_amount, U256::from(990));
		assert_eq!(infos.best_case.gas, 191_000);
		assert_eq!(infos.best_case.protocol_fee_in_wei_amount, U256::from(700_000));
		assert_eq!(infos.best_case.slippage, Decimal::ZERO);

		// Only the bridge order slips: floor(2000 * 0.99) + 500.
		assert_eq!(infos.worst_case.maker_amount, U256::from(2_480));
		assert_eq!(infos.worst_case.total_taker_amount, U256::from(1_000));
		assert_eq!(infos.worst_case.slippage, Decimal::new(1, 2));

		assert_eq!(
			infos.source_breakdown.get(&LiquiditySource::UniswapV2),
			Some(&BreakdownEntry::Proportion(Decimal::new(75, 2)))
		);
		assert_eq!(
			infos.source_breakdown.get(&LiquiditySource::Native),
			Some(&BreakdownEntry::Proportion(Decimal::new(25, 2)))
		);
	}

	#[test]
	fn test_two_hop_quote_info() {
		let intermediate = Address::repeat_byte(0x77);
		let hop = |source| HopSource {
			source,
			fill_data: Box::new(FillData::Balancer {
				pool_address: Address::ZERO,
			}),
		};
		let summary = FillSummary {
			input: U256::from(1_000),
			output: U256::from(3_000),
			adjusted_output: U256::from(2_900),
			gas: 210_000,
		};
		let order = |source, maker_token, taker_token, maker_amount, taker_amount| OptimizedOrder {
			fill_type: FillType::Bridge,
			source,
			maker_token,
			taker_token,
			maker_amount,
			taker_amount,
			fill_data: FillData::MultiHop {
				first_hop: hop(LiquiditySource::UniswapV2),
				second_hop: hop(LiquiditySource::Curve),
				intermediate_token: intermediate,
			},
			fill: summary.clone(),
		};

		let sell = vec![
			order(LiquiditySource::UniswapV2, intermediate, TAKER, U256::ZERO, U256::from(1_000)),
			order(LiquiditySource::Curve, MAKER, intermediate, U256::from(3_000), MAX_UINT256),
		];
		let infos = calculate_quote_info(&sell, true, &opts(MarketOperation::Sell)).unwrap();
		assert_eq!(infos.best_case.maker_amount, U256::from(3_000));
		assert_eq!(infos.best_case.taker_amount, U256::from(1_000));
		assert_eq!(infos.worst_case.maker_amount, U256::from(2_970));
		assert_eq!(infos.worst_case.taker_amount, U256::from(1_000));
		assert_eq!(infos.best_case.gas, 211_000);
		assert_eq!(
			infos.source_breakdown.get(&LiquiditySource::MultiHop),
			Some(&BreakdownEntry::MultiHop {
				proportion: Decimal::ONE,
				intermediate_token: intermediate,
				hops: [LiquiditySource::UniswapV2, LiquiditySource::Curve],
			})
		);

		let buy = vec![
			order(LiquiditySource::UniswapV2, intermediate, TAKER, U256::ZERO, U256::from(3_000)),
			order(LiquiditySource::Curve, MAKER, intermediate, U256::from(1_000), MAX_UINT256),
		];
		let infos = calculate_quote_info(&buy, true, &opts(MarketOperation::Buy)).unwrap();
		assert_eq!(infos.best_case.maker_amount, U256::from(1_000));
		assert_eq!(infos.best_case.total_taker_amount, U256::from(3_000));
		assert_eq!(infos.worst_case.total_taker_amount, U256::from(3_030));
	}

	#[test]
	fn test_worst_case_never_beats_best_case() {
		let mut seed = 0x2545_f491_4f6c_dd1du64;
		let mut next = move || {
			seed ^= seed << 13;
			seed ^= seed >> 7;
			seed ^= seed << 17;
			seed % 1_000_000_007 + 1
		};

		for _ in 0..200 {
			let orders: Vec<OptimizedOrder> = (0..3)
				.map(|_| {
					let taker = next();
					bridge_order(LiquiditySource::Curve, next(), taker, taker)
				})
				.collect();
			let slippage = Decimal::new((next() % 1_000) as i64, 3);
			for side in [MarketOperation::Sell, MarketOperation::Buy] {
				let opts = QuoteInfoOpts {
					slippage,
					..opts(side)
				};
				let infos = calculate_quote_info(&orders, false, &opts).unwrap();
				match side {
					MarketOperation::Sell => {
						assert!(infos.worst_case.maker_amount <= infos.best_case.maker_amount)
					}
					MarketOperation::Buy => assert!(
						infos.worst_case.total_taker_amount >= infos.best_case.total_taker_amount
					),
				}
			}
		}
	}
}
