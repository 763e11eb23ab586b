//! Best-path search over marginal liquidity curves.
//!
//! Each source path's cumulative fills are turned into marginal segments,
//! smoothed into a concave hull so that front-loaded gas does not hide a
//! source's later, better liquidity. Segments from all curves are then merged
//! greedily through a priority queue keyed by their exact rate.

use alloy_primitives::U256;
use priority_queue::PriorityQueue;
use rust_decimal::Decimal;
use std::cmp::{Ordering, Reverse};
use std::sync::Arc;
use swapper_types::{Fill, LiquiditySource, MarketOperation, SourceFlags};
use tracing::debug;

use crate::path::Path;
use crate::rate::{decimal_fraction, mul_div, widen, Rate};
use crate::OptimizerError;

/// Extra cost of routing through the exchange proxy, in output units, for a
/// path using the given sources.
pub type ExchangeProxyOverhead = Arc<dyn Fn(SourceFlags) -> U256 + Send + Sync>;

/// Knobs of a single optimization.
#[derive(Clone)]
pub struct OptimizerOpts {
	/// Slippage applied to bridge orders of the worst-case quote.
	pub bridge_slippage: Decimal,
	/// Largest rate loss a fallback path may have against the primary.
	pub max_fallback_slippage: Decimal,
	pub allow_fallback: bool,
	pub exchange_proxy_overhead: ExchangeProxyOverhead,
}

impl Default for OptimizerOpts {
	fn default() -> Self {
		Self {
			bridge_slippage: Decimal::new(5, 3),
			max_fallback_slippage: Decimal::new(5, 2),
			allow_fallback: true,
			exchange_proxy_overhead: Arc::new(|_| U256::ZERO),
		}
	}
}

impl std::fmt::Debug for OptimizerOpts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OptimizerOpts")
			.field("bridge_slippage", &self.bridge_slippage)
			.field("max_fallback_slippage", &self.max_fallback_slippage)
			.field("allow_fallback", &self.allow_fallback)
			.finish_non_exhaustive()
	}
}

/// The chosen path and an optional fallback over disjoint sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedPath {
	pub optimal: Path,
	pub fallback: Option<Path>,
}

#[derive(Debug, Clone)]
struct Segment {
	input: U256,
	output: U256,
	adjusted_output: U256,
	/// Index of the cumulative fill this segment ends at.
	end: usize,
}

impl Segment {
	fn rate(&self) -> Rate {
		Rate::new(self.adjusted_output, self.input)
	}
}

/// One source path's liquidity as marginal segments.
#[derive(Debug, Clone)]
struct Curve {
	fills: Vec<Fill>,
	segments: Vec<Segment>,
}

impl Curve {
	/// Builds the concave (sell) or convex (buy) hull of the cumulative fills.
	fn new(side: MarketOperation, mut fills: Vec<Fill>) -> Self {
		fills.sort_by(|a, b| a.input.cmp(&b.input));
		fills.dedup_by(|b, a| a.input == b.input);

		let mut segments = Vec::new();
		let mut cursor: Option<usize> = None;
		loop {
			let start = cursor.map(|i| i + 1).unwrap_or(0);
			if start >= fills.len() {
				break;
			}
			let (base_in, base_out, base_adj) = match cursor {
				Some(i) => (fills[i].input, fills[i].output, fills[i].adjusted_output),
				None => (U256::ZERO, U256::ZERO, U256::ZERO),
			};

			// Best average rate reachable from the cursor; the nearest point wins ties.
			let mut best: Option<(usize, Rate)> = None;
			for (j, fill) in fills.iter().enumerate().skip(start) {
				let rate = Rate::new(
					fill.adjusted_output.saturating_sub(base_adj),
					fill.input - base_in,
				);
				let better = match &best {
					None => true,
					Some((_, best_rate)) => rate.cmp_for(best_rate, side) == Ordering::Greater,
				};
				if better {
					best = Some((j, rate));
				}
			}
			let Some((end, _)) = best else { break };
			segments.push(Segment {
				input: fills[end].input - base_in,
				output: fills[end].output.saturating_sub(base_out),
				adjusted_output: fills[end].adjusted_output.saturating_sub(base_adj),
				end,
			});
			cursor = Some(end);
		}

		Self { fills, segments }
	}
}

#[derive(Debug, Clone, Copy)]
struct SegmentPriority {
	rate: Rate,
	side: MarketOperation,
	curve: usize,
}

impl PartialEq for SegmentPriority {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for SegmentPriority {}

impl PartialOrd for SegmentPriority {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for SegmentPriority {
	fn cmp(&self, other: &Self) -> Ordering {
		// Earlier curves win ties.
		self.rate
			.cmp_for(&other.rate, self.side)
			.then_with(|| Reverse(self.curve).cmp(&Reverse(other.curve)))
	}
}

#[derive(Debug, Clone)]
struct Consumed {
	input: U256,
	output: U256,
	adjusted_output: U256,
	end: usize,
}

/// Greedily consumes the best segment across `curves` until `target_input` is met.
fn merge(side: MarketOperation, target_input: U256, curves: &[&Curve]) -> Path {
	let mut queue: PriorityQueue<usize, SegmentPriority> = PriorityQueue::new();
	let mut next_segment = vec![0usize; curves.len()];
	for (i, curve) in curves.iter().enumerate() {
		if let Some(segment) = curve.segments.first() {
			queue.push(
				i,
				SegmentPriority {
					rate: segment.rate(),
					side,
					curve: i,
				},
			);
		}
	}

	let mut consumed: Vec<(usize, Consumed)> = Vec::new();
	let mut remaining = target_input;
	while !remaining.is_zero() {
		let Some((i, _)) = queue.pop() else { break };
		let curve = curves[i];
		let segment = &curve.segments[next_segment[i]];
		next_segment[i] += 1;

		let (input, output, adjusted_output) = if segment.input > remaining {
			let round_up = side == MarketOperation::Buy;
			(
				remaining,
				mul_div(segment.output, remaining, segment.input, round_up),
				mul_div(segment.adjusted_output, remaining, segment.input, round_up),
			)
		} else {
			(segment.input, segment.output, segment.adjusted_output)
		};
		remaining -= input;

		match consumed.iter_mut().find(|(c, _)| *c == i) {
			Some((_, slot)) => {
				slot.input += input;
				slot.output = slot.output.saturating_add(output);
				slot.adjusted_output = slot.adjusted_output.saturating_add(adjusted_output);
				slot.end = segment.end;
			}
			None => consumed.push((
				i,
				Consumed {
					input,
					output,
					adjusted_output,
					end: segment.end,
				},
			)),
		}

		if let Some(next) = curve.segments.get(next_segment[i]) {
			queue.push(
				i,
				SegmentPriority {
					rate: next.rate(),
					side,
					curve: i,
				},
			);
		}
	}

	let fills = consumed
		.into_iter()
		.map(|(i, c)| {
			let template = &curves[i].fills[c.end];
			Fill {
				input: c.input,
				output: c.output,
				adjusted_output: c.adjusted_output,
				..template.clone()
			}
		})
		.collect();
	Path::new(side, target_input, fills)
}

/// Finds the best path through a set of fills.
#[derive(Debug, Clone, Default)]
pub struct PathOptimizer {
	opts: OptimizerOpts,
}

impl PathOptimizer {
	pub fn new(opts: OptimizerOpts) -> Self {
		Self { opts }
	}

	pub fn opts(&self) -> &OptimizerOpts {
		&self.opts
	}

	/// Optimizes `fills` (one cumulative vector per source path, one vector
	/// per native order) and `two_hop` fills for `target_input`.
	pub fn optimize(
		&self,
		side: MarketOperation,
		target_input: U256,
		fills: Vec<Vec<Fill>>,
		two_hop: Vec<Fill>,
	) -> Result<OptimizedPath, OptimizerError> {
		let curves: Vec<Curve> = fills
			.into_iter()
			.filter(|f| !f.is_empty())
			.map(|f| Curve::new(side, f))
			.filter(|c| !c.segments.is_empty())
			.collect();
		if curves.is_empty() && two_hop.is_empty() {
			return Err(OptimizerError::NoLiquidity);
		}

		let all: Vec<&Curve> = curves.iter().collect();
		let optimal = self
			.best_path(side, target_input, &all, &two_hop)
			.ok_or(OptimizerError::NoOptimalPath)?;
		debug!(
			sources = optimal.source_flags().count(),
			fills = optimal.fills.len(),
			"Found optimal path"
		);

		let fallback = if self.opts.allow_fallback {
			self.fallback_path(side, target_input, &curves, &optimal)
		} else {
			None
		};

		Ok(OptimizedPath { optimal, fallback })
	}

	/// Best complete candidate: the full merge, each single source path and
	/// each two-hop route.
	fn best_path(
		&self,
		side: MarketOperation,
		target_input: U256,
		curves: &[&Curve],
		two_hop: &[Fill],
	) -> Option<Path> {
		if target_input.is_zero() {
			return None;
		}
		let overhead = self.opts.exchange_proxy_overhead.as_ref();

		let mut candidates = Vec::with_capacity(curves.len() + two_hop.len() + 1);
		if !curves.is_empty() {
			candidates.push(merge(side, target_input, curves));
		}
		if curves.len() > 1 {
			candidates.extend(curves.iter().map(|c| merge(side, target_input, &[*c])));
		}
		candidates.extend(
			two_hop
				.iter()
				.filter(|f| f.input >= target_input)
				.map(|f| Path::new(side, target_input, vec![f.clone()])),
		);

		let mut best: Option<Path> = None;
		for candidate in candidates.into_iter().filter(Path::is_complete) {
			best = match best {
				Some(current) if !candidate.is_adjusted_better_than(&current, overhead) => Some(current),
				_ => Some(candidate),
			};
		}
		best
	}

	/// Optimizes over the sources the primary path left unused, native orders
	/// excluded, and keeps the result only if it is close enough in price.
	fn fallback_path(
		&self,
		side: MarketOperation,
		target_input: U256,
		curves: &[Curve],
		optimal: &Path,
	) -> Option<Path> {
		let used = optimal.source_flags();
		let unused: Vec<&Curve> = curves
			.iter()
			.filter(|c| {
				c.fills
					.first()
					.map(|f| f.source != LiquiditySource::Native && !used.contains(f.source))
					.unwrap_or(false)
			})
			.collect();
		if unused.is_empty() {
			return None;
		}

		let fallback = self.best_path(side, target_input, &unused, &[])?;
		if self.within_fallback_slippage(side, &optimal.rate(), &fallback.rate()) {
			Some(fallback)
		} else {
			debug!("Dropping fallback path outside max fallback slippage");
			None
		}
	}

	fn within_fallback_slippage(&self, side: MarketOperation, primary: &Rate, fallback: &Rate) -> bool {
		let Some((numerator, denominator)) = decimal_fraction(self.opts.max_fallback_slippage) else {
			return false;
		};
		if primary.output.is_zero() || fallback.input.is_zero() {
			return false;
		}
		// ratio = fallback / primary = (fo * pi) / (fi * po)
		let lhs = widen(fallback.output) * widen(primary.input) * widen(denominator);
		let base = widen(fallback.input) * widen(primary.output);
		match side {
			// 1 - ratio <= s
			MarketOperation::Sell => lhs >= base * widen(denominator - numerator),
			// ratio - 1 <= s
			MarketOperation::Buy => lhs <= base * widen(denominator + numerator),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fills::tests::limit_order;
	use crate::fills::{dex_samples_to_fills, native_orders_to_fills, FillOpts};
	use alloy_primitives::Address;
	use swapper_types::{FillData, Sample};

	fn samples(source: LiquiditySource, router: u8, points: &[(u64, u64)]) -> Vec<Sample> {
		points
			.iter()
			.map(|(i, o)| Sample {
				source,
				input: U256::from(*i),
				output: U256::from(*o),
				fill_data: FillData::UniswapV2 {
					router: Address::repeat_byte(router),
					token_address_path: vec![Address::repeat_byte(2), Address::repeat_byte(3)],
				},
			})
			.collect()
	}

	fn fills(source: LiquiditySource, router: u8, points: &[(u64, u64)]) -> Vec<Fill> {
		dex_samples_to_fills(
			MarketOperation::Sell,
			&samples(source, router, points),
			&FillOpts::default(),
		)
	}

	#[test]
	fn test_merge_splits_across_sources() {
		// Two identical diminishing curves share the volume.
		let a = fills(LiquiditySource::UniswapV2, 1, &[(50, 100), (100, 150)]);
		let b = fills(LiquiditySource::SushiSwap, 2, &[(50, 100), (100, 150)]);
		let result = PathOptimizer::default()
			.optimize(MarketOperation::Sell, U256::from(100), vec![a, b], vec![])
			.unwrap();
		let path = result.optimal;
		assert!(path.is_complete());
		assert_eq!(path.fills.len(), 2);
		assert_eq!(path.output(), U256::from(200));
		assert_eq!(path.fills[0].source, LiquiditySource::UniswapV2);
	}

	#[test]
	fn test_clamps_last_segment() {
		let a = fills(LiquiditySource::UniswapV2, 1, &[(100, 300)]);
		let path = PathOptimizer::default()
			.optimize(MarketOperation::Sell, U256::from(33), vec![a], vec![])
			.unwrap()
			.optimal;
		assert_eq!(path.input(), U256::from(33));
		assert_eq!(path.output(), U256::from(99));
	}

	#[test]
	fn test_hull_smooths_front_loaded_gas() {
		let opts = FillOpts {
			gas_price: U256::from(1),
			output_amount_per_eth: U256::from(1_000_000_000_000_000u64),
			..Default::default()
		};
		// Penalty of 90 output units on every cumulative point.
		let curve = dex_samples_to_fills(
			MarketOperation::Sell,
			&samples(LiquiditySource::UniswapV2, 1, &[(10, 100), (20, 200), (30, 250)]),
			&opts,
		);
		let built = Curve::new(MarketOperation::Sell, curve);
		// First point alone nets 10; reaching 20 nets 110, a better average.
		assert_eq!(built.segments[0].end, 1);
		assert_eq!(built.segments[0].adjusted_output, U256::from(110));
		assert_eq!(built.segments[1].adjusted_output, U256::from(50));
		assert_eq!(built.segments[1].output, U256::from(50));
	}

	#[test]
	fn test_no_liquidity_and_no_optimal_path() {
		let optimizer = PathOptimizer::default();
		assert_eq!(
			optimizer.optimize(MarketOperation::Sell, U256::from(10), vec![vec![]], vec![]),
			Err(OptimizerError::NoLiquidity)
		);
		let small = fills(LiquiditySource::UniswapV2, 1, &[(5, 10)]);
		assert_eq!(
			optimizer.optimize(MarketOperation::Sell, U256::from(10), vec![small], vec![]),
			Err(OptimizerError::NoOptimalPath)
		);
	}

	#[test]
	fn test_prefers_fewer_sources_under_overhead() {
		let a = fills(LiquiditySource::UniswapV2, 1, &[(50, 100), (100, 190)]);
		let b = fills(LiquiditySource::SushiSwap, 2, &[(50, 100), (100, 190)]);

		// Splitting yields 200 vs 190 for a single source.
		let split = PathOptimizer::default()
			.optimize(MarketOperation::Sell, U256::from(100), vec![a.clone(), b.clone()], vec![])
			.unwrap();
		assert_eq!(split.optimal.fills.len(), 2);

		// Charging 20 per extra source makes the single source path win.
		let opts = OptimizerOpts {
			exchange_proxy_overhead: Arc::new(|flags: SourceFlags| {
				U256::from(20u64 * u64::from(flags.count().saturating_sub(1)))
			}),
			..Default::default()
		};
		let single = PathOptimizer::new(opts)
			.optimize(MarketOperation::Sell, U256::from(100), vec![a, b], vec![])
			.unwrap();
		assert_eq!(single.optimal.fills.len(), 1);
		assert_eq!(single.optimal.output(), U256::from(190));
	}

	#[test]
	fn test_two_hop_candidate_and_native_curve() {
		let dex = fills(LiquiditySource::UniswapV2, 1, &[(100, 150)]);
		let native = native_orders_to_fills(
			MarketOperation::Sell,
			&[limit_order(160, 100, 0)],
			U256::from(100),
			&FillOpts::default(),
		);
		let result = PathOptimizer::default()
			.optimize(
				MarketOperation::Sell,
				U256::from(100),
				vec![dex.clone(), native],
				vec![],
			)
			.unwrap();
		assert_eq!(result.optimal.fills.len(), 1);
		assert_eq!(result.optimal.fills[0].source, LiquiditySource::Native);

		let mut two_hop = dex[0].clone();
		two_hop.source = LiquiditySource::MultiHop;
		two_hop.output = U256::from(170);
		two_hop.adjusted_output = U256::from(170);
		let result = PathOptimizer::default()
			.optimize(MarketOperation::Sell, U256::from(100), vec![dex], vec![two_hop])
			.unwrap();
		assert_eq!(result.optimal.fills[0].source, LiquiditySource::MultiHop);
	}

	#[test]
	fn test_fallback_respects_max_slippage() {
		let primary = fills(LiquiditySource::UniswapV2, 1, &[(100, 200)]);
		let close = fills(LiquiditySource::SushiSwap, 2, &[(100, 195)]);
		let far = fills(LiquiditySource::SushiSwap, 2, &[(100, 150)]);

		let optimizer = PathOptimizer::default();
		let kept = optimizer
			.optimize(MarketOperation::Sell, U256::from(100), vec![primary.clone(), close], vec![])
			.unwrap();
		// The merge prefers the better source for the full amount.
		assert_eq!(kept.optimal.fills[0].source, LiquiditySource::UniswapV2);
		let fallback = kept.fallback.unwrap();
		assert_eq!(fallback.fills[0].source, LiquiditySource::SushiSwap);

		let dropped = optimizer
			.optimize(MarketOperation::Sell, U256::from(100), vec![primary.clone(), far], vec![])
			.unwrap();
		assert!(dropped.fallback.is_none());

		let disabled = PathOptimizer::new(OptimizerOpts {
			allow_fallback: false,
			..Default::default()
		})
		.optimize(MarketOperation::Sell, U256::from(100), vec![primary], vec![])
		.unwrap();
		assert!(disabled.fallback.is_none());
	}

	#[test]
	fn test_buy_side_prefers_cheaper_cost() {
		let buy_fills = |router, cost| {
			dex_samples_to_fills(
				MarketOperation::Buy,
				&samples(LiquiditySource::UniswapV2, router, &[(100, cost)]),
				&FillOpts::default(),
			)
		};
		let result = PathOptimizer::default()
			.optimize(
				MarketOperation::Buy,
				U256::from(40),
				vec![buy_fills(1, 300), buy_fills(2, 200)],
				vec![],
			)
			.unwrap();
		assert_eq!(result.optimal.fills.len(), 1);
		assert_eq!(result.optimal.fills[0].input, U256::from(40));
		assert_eq!(result.optimal.output(), U256::from(80));
	}
}
