//! Quote reports and the comparison price offered to RFQ makers.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use swapper_optimizer::{mul_div, Path, Rate};
use swapper_sampler::RfqFirmQuote;
use swapper_types::{
	Fill, FillData, MarketOperation, NativeOrderWithFillableAmounts, QuoteReport, QuoteReportEntry,
	Sample,
};

/// Decimal places of a comparison price.
const COMPARISON_PRICE_DECIMALS: u32 = 10;

struct FillInfo {
	maker_amount: U256,
	taker_amount: U256,
}

fn fill_info(fill: &Fill, side: MarketOperation) -> FillInfo {
	if let FillData::Native(order) = &fill.fill_data {
		return FillInfo {
			maker_amount: order.fillable_maker_amount,
			taker_amount: order.fillable_taker_amount,
		};
	}
	match side {
		MarketOperation::Sell => FillInfo {
			maker_amount: fill.output,
			taker_amount: fill.input,
		},
		MarketOperation::Buy => FillInfo {
			maker_amount: fill.input,
			taker_amount: fill.output,
		},
	}
}

fn to_unit_amount(amount: U256, decimals: u8) -> Option<Decimal> {
	let raw = i128::try_from(u128::try_from(amount).ok()?).ok()?;
	Decimal::try_from_i128_with_scale(raw, u32::from(decimals)).ok()
}

/// Price RFQ makers have to beat, in maker units per taker unit.
///
/// Fills of `path` are consumed from the cheapest for the taker until
/// `amount` (taker units for sells, maker units for buys) is covered. Returns
/// `None` when nothing was consumed or the amounts do not fit a decimal.
pub fn get_comparison_price(
	path: &Path,
	side: MarketOperation,
	amount: U256,
	maker_decimals: u8,
	taker_decimals: u8,
) -> Option<Decimal> {
	let mut fills: Vec<FillInfo> = path
		.fills
		.iter()
		.map(|f| fill_info(f, side))
		.filter(|f| !f.maker_amount.is_zero() && !f.taker_amount.is_zero())
		.collect();
	// Fewest taker units per maker unit first.
	fills.sort_by(|a, b| {
		Rate::new(a.taker_amount, a.maker_amount).cmp_value(&Rate::new(b.taker_amount, b.maker_amount))
	});

	let mut remaining = amount;
	let mut maker_total = U256::ZERO;
	let mut taker_total = U256::ZERO;
	for fill in &fills {
		if remaining.is_zero() {
			break;
		}
		match side {
			MarketOperation::Sell => {
				let consumed = fill.taker_amount.min(remaining);
				taker_total += consumed;
				maker_total += mul_div(consumed, fill.maker_amount, fill.taker_amount, false);
				remaining -= consumed;
			}
			MarketOperation::Buy => {
				let consumed = fill.maker_amount.min(remaining);
				maker_total += consumed;
				taker_total += mul_div(consumed, fill.taker_amount, fill.maker_amount, true);
				remaining -= consumed;
			}
		}
	}

	if maker_total.is_zero() || taker_total.is_zero() {
		return None;
	}
	let maker_units = to_unit_amount(maker_total, maker_decimals)?;
	let taker_units = to_unit_amount(taker_total, taker_decimals)?;
	maker_units
		.checked_div(taker_units)
		.map(|p| p.round_dp(COMPARISON_PRICE_DECIMALS).normalize())
}

fn amounts(side: MarketOperation, input: U256, output: U256) -> (U256, U256) {
	match side {
		MarketOperation::Sell => (output, input),
		MarketOperation::Buy => (input, output),
	}
}

fn native_entry(
	order: &NativeOrderWithFillableAmounts,
	rfq_quotes: &[RfqFirmQuote],
	comparison_price: Option<Decimal>,
) -> QuoteReportEntry {
	let maker_amount = U256::from(order.order.maker_amount());
	let taker_amount = U256::from(order.order.taker_amount());
	if order.order.is_rfq() {
		QuoteReportEntry::NativeRfqOrder {
			maker_amount,
			taker_amount,
			fillable_taker_amount: order.fillable_taker_amount,
			maker_uri: rfq_quotes
				.iter()
				.find(|q| q.order.order == order.order)
				.map(|q| q.maker_uri.clone()),
			comparison_price,
		}
	} else {
		QuoteReportEntry::NativeLimitOrder {
			maker_amount,
			taker_amount,
			fillable_taker_amount: order.fillable_taker_amount,
		}
	}
}

fn sample_entry(sample: &Sample, side: MarketOperation) -> QuoteReportEntry {
	let (maker_amount, taker_amount) = amounts(side, sample.input, sample.output);
	match &sample.fill_data {
		FillData::MultiHop {
			first_hop,
			second_hop,
			..
		} => QuoteReportEntry::MultiHop {
			maker_amount,
			taker_amount,
			hop_sources: vec![first_hop.source, second_hop.source],
		},
		_ => QuoteReportEntry::Bridge {
			liquidity_source: sample.source,
			maker_amount,
			taker_amount,
		},
	}
}

fn fill_entry(
	fill: &Fill,
	side: MarketOperation,
	rfq_quotes: &[RfqFirmQuote],
	comparison_price: Option<Decimal>,
) -> QuoteReportEntry {
	if let FillData::Native(order) = &fill.fill_data {
		return native_entry(order, rfq_quotes, comparison_price);
	}
	sample_entry(
		&Sample {
			source: fill.source,
			input: fill.input,
			output: fill.output,
			fill_data: fill.fill_data.clone(),
		},
		side,
	)
}

/// Lists every source considered for a quote and the ones the path delivers.
///
/// A DEX source path is reported at its largest sample, which is the full
/// requested amount.
pub fn generate_quote_report(
	side: MarketOperation,
	dex_samples: &[Vec<Sample>],
	two_hop_samples: &[Sample],
	native_orders: &[NativeOrderWithFillableAmounts],
	rfq_quotes: &[RfqFirmQuote],
	path: &Path,
	comparison_price: Option<Decimal>,
) -> QuoteReport {
	let mut sources_considered: Vec<QuoteReportEntry> = dex_samples
		.iter()
		.filter_map(|samples| samples.last())
		.map(|s| sample_entry(s, side))
		.collect();
	sources_considered.extend(
		native_orders
			.iter()
			.map(|o| native_entry(o, rfq_quotes, comparison_price)),
	);
	sources_considered.extend(two_hop_samples.iter().map(|s| sample_entry(s, side)));

	let sources_delivered = path
		.fills
		.iter()
		.map(|f| fill_entry(f, side, rfq_quotes, comparison_price))
		.collect();

	QuoteReport {
		sources_considered,
		sources_delivered,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, B256};
	use swapper_types::{
		FillType, LiquiditySource, NativeOrder, RfqOrder, Signature, SignatureType, SourceFlags,
	};

	fn bridge_fill(source: LiquiditySource, input: u64, output: u64) -> Fill {
		Fill {
			source_path_id: format!("{}", source),
			source,
			fill_type: FillType::Bridge,
			input: U256::from(input),
			output: U256::from(output),
			adjusted_output: U256::from(output),
			fill_data: FillData::Balancer {
				pool_address: Address::ZERO,
			},
			gas: 0,
			flags: SourceFlags::from(source),
		}
	}

	fn rfq_order(maker_amount: u128, taker_amount: u128) -> NativeOrderWithFillableAmounts {
		NativeOrderWithFillableAmounts::fully_fillable(
			NativeOrder::Rfq(RfqOrder {
				maker_token: Address::repeat_byte(2),
				taker_token: Address::repeat_byte(1),
				maker_amount,
				taker_amount,
				maker: Address::repeat_byte(9),
				taker: Address::repeat_byte(8),
				tx_origin: Address::repeat_byte(8),
				pool: B256::ZERO,
				expiry: u64::MAX,
				salt: U256::from(7),
			}),
			Signature {
				signature_type: SignatureType::Eip712,
				v: 28,
				r: B256::ZERO,
				s: B256::ZERO,
			},
		)
	}

	#[test]
	fn test_comparison_price_consumes_cheapest_first() {
		// 6 decimals maker, 18 decimals taker.
		let one = 10u64.pow(18);
		let path = Path::new(
			MarketOperation::Sell,
			U256::from(2 * one),
			vec![
				bridge_fill(LiquiditySource::UniswapV2, one, 1_000_000_000),
				bridge_fill(LiquiditySource::Curve, one, 2_000_000_000),
			],
		);
		// Only the better Curve fill is needed for one taker unit.
		let price = get_comparison_price(&path, MarketOperation::Sell, U256::from(one), 6, 18);
		assert_eq!(price, Some(Decimal::from(2_000)));

		let price = get_comparison_price(&path, MarketOperation::Sell, U256::from(2 * one), 6, 18);
		assert_eq!(price, Some(Decimal::from(1_500)));

		let thirds = Path::new(
			MarketOperation::Sell,
			U256::from(3u64),
			vec![bridge_fill(LiquiditySource::UniswapV2, 3, 1)],
		);
		let price = get_comparison_price(&thirds, MarketOperation::Sell, U256::from(3u64), 0, 0);
		assert_eq!(price, Some(Decimal::new(3_333_333_333, 10)));

		let empty = Path::new(MarketOperation::Sell, U256::from(1u64), vec![]);
		assert_eq!(
			get_comparison_price(&empty, MarketOperation::Sell, U256::from(1u64), 18, 18),
			None
		);
	}

	#[test]
	fn test_comparison_price_for_buys() {
		// Buying 10 maker units that cost 25 taker units.
		let path = Path::new(
			MarketOperation::Buy,
			U256::from(10u64),
			vec![bridge_fill(LiquiditySource::Balancer, 10, 25)],
		);
		let price = get_comparison_price(&path, MarketOperation::Buy, U256::from(10u64), 0, 0);
		assert_eq!(price, Some(Decimal::new(4, 1)));
	}

	#[test]
	fn test_quote_report_entries() {
		let sample = |input: u64, output: u64| Sample {
			source: LiquiditySource::UniswapV2,
			input: U256::from(input),
			output: U256::from(output),
			fill_data: FillData::UniswapV2 {
				router: Address::ZERO,
				token_address_path: vec![],
			},
		};
		let rfq = rfq_order(500, 100);
		let quotes = vec![RfqFirmQuote {
			order: rfq.clone(),
			maker_uri: "https://maker.example".to_string(),
		}];
		let native_fill = Fill {
			source_path_id: "native".into(),
			source: LiquiditySource::Native,
			fill_type: FillType::Rfq,
			input: U256::from(100u64),
			output: U256::from(500u64),
			adjusted_output: U256::from(500u64),
			fill_data: FillData::Native(rfq.clone()),
			gas: 0,
			flags: SourceFlags::from(LiquiditySource::Native),
		};
		let path = Path::new(MarketOperation::Sell, U256::from(100u64), vec![native_fill]);

		let report = generate_quote_report(
			MarketOperation::Sell,
			&[vec![sample(50, 120), sample(100, 230)]],
			&[],
			&[rfq],
			&quotes,
			&path,
			Some(Decimal::from(2)),
		);

		assert_eq!(report.sources_considered.len(), 2);
		assert_eq!(
			report.sources_considered[0],
			QuoteReportEntry::Bridge {
				liquidity_source: LiquiditySource::UniswapV2,
				maker_amount: U256::from(230u64),
				taker_amount: U256::from(100u64),
			}
		);
		match &report.sources_delivered[0] {
			QuoteReportEntry::NativeRfqOrder {
				maker_uri,
				comparison_price,
				..
			} => {
				assert_eq!(maker_uri.as_deref(), Some("https://maker.example"));
				assert_eq!(*comparison_price, Some(Decimal::from(2)));
			}
			other => panic!("unexpected entry {:?}", other),
		}
	}
}
