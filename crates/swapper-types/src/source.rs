//! Liquidity sources and the bit flags used to track which sources a path touches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A venue the swapper can route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LiquiditySource {
	/// Signed 0x limit and RFQ orders.
	Native,
	#[serde(rename = "Uniswap_V2")]
	UniswapV2,
	SushiSwap,
	#[serde(rename = "Uniswap_V3")]
	UniswapV3,
	Curve,
	Balancer,
	LiquidityProvider,
	PancakeSwap,
	/// Synthetic source for a route through an intermediate token.
	MultiHop,
}

impl LiquiditySource {
	/// Every source, in flag order.
	pub const ALL: [LiquiditySource; 9] = [
		LiquiditySource::Native,
		LiquiditySource::UniswapV2,
		LiquiditySource::SushiSwap,
		LiquiditySource::UniswapV3,
		LiquiditySource::Curve,
		LiquiditySource::Balancer,
		LiquiditySource::LiquidityProvider,
		LiquiditySource::PancakeSwap,
		LiquiditySource::MultiHop,
	];

	/// Returns the flag bit for this source.
	pub fn flag(self) -> SourceFlags {
		SourceFlags(1u64 << (self as u64))
	}

	/// Name used on the wire and in quote reports.
	pub fn name(self) -> &'static str {
		match self {
			LiquiditySource::Native => "Native",
			LiquiditySource::UniswapV2 => "Uniswap_V2",
			LiquiditySource::SushiSwap => "SushiSwap",
			LiquiditySource::UniswapV3 => "Uniswap_V3",
			LiquiditySource::Curve => "Curve",
			LiquiditySource::Balancer => "Balancer",
			LiquiditySource::LiquidityProvider => "LiquidityProvider",
			LiquiditySource::PancakeSwap => "PancakeSwap",
			LiquiditySource::MultiHop => "MultiHop",
		}
	}

	/// Parses a source from its wire name.
	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|s| s.name() == name)
	}

	/// Sources that may appear as a hop inside a multi-hop route.
	pub fn is_hop_source(self) -> bool {
		matches!(
			self,
			LiquiditySource::UniswapV2
				| LiquiditySource::SushiSwap
				| LiquiditySource::UniswapV3
				| LiquiditySource::Curve
				| LiquiditySource::LiquidityProvider
		)
	}
}

impl fmt::Display for LiquiditySource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Set of liquidity sources packed into a bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceFlags(pub u64);

impl SourceFlags {
	pub const fn empty() -> Self {
		SourceFlags(0)
	}

	pub fn is_empty(&self) -> bool {
		self.0 == 0
	}

	pub fn contains(&self, source: LiquiditySource) -> bool {
		self.0 & source.flag().0 != 0
	}

	/// True when every flag in `other` is also set here.
	pub fn contains_all(&self, other: SourceFlags) -> bool {
		self.0 & other.0 == other.0
	}

	pub fn insert(&mut self, source: LiquiditySource) {
		self.0 |= source.flag().0;
	}

	/// Iterates the sources present in the set.
	pub fn iter(&self) -> impl Iterator<Item = LiquiditySource> + '_ {
		LiquiditySource::ALL
			.into_iter()
			.filter(move |s| self.contains(*s))
	}

	pub fn count(&self) -> u32 {
		self.0.count_ones()
	}
}

impl From<LiquiditySource> for SourceFlags {
	fn from(source: LiquiditySource) -> Self {
		source.flag()
	}
}

impl FromIterator<LiquiditySource> for SourceFlags {
	fn from_iter<T: IntoIterator<Item = LiquiditySource>>(iter: T) -> Self {
		let mut flags = SourceFlags::empty();
		for source in iter {
			flags.insert(source);
		}
		flags
	}
}

impl BitOr for SourceFlags {
	type Output = SourceFlags;

	fn bitor(self, rhs: SourceFlags) -> SourceFlags {
		SourceFlags(self.0 | rhs.0)
	}
}

impl BitOrAssign for SourceFlags {
	fn bitor_assign(&mut self, rhs: SourceFlags) {
		self.0 |= rhs.0;
	}
}

/// Direction of a market order.
///
/// For a sell the input is the taker token and the output the maker token.
/// A buy flips both: the input is the maker amount wanted and the output is
/// the taker amount it costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketOperation {
	Sell,
	Buy,
}

/// Include/exclude lists applied to the set of sources the sampler queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFilters {
	#[serde(default)]
	pub included: Vec<LiquiditySource>,
	#[serde(default)]
	pub excluded: Vec<LiquiditySource>,
}

impl SourceFilters {
	/// A source is allowed when it is not excluded and either nothing is
	/// explicitly included or it is among the included.
	pub fn is_allowed(&self, source: LiquiditySource) -> bool {
		if self.excluded.contains(&source) {
			return false;
		}
		self.included.is_empty() || self.included.contains(&source)
	}

	/// Combines two filters; the result allows only what both allow.
	pub fn merge(&self, other: &SourceFilters) -> SourceFilters {
		let included = match (self.included.is_empty(), other.included.is_empty()) {
			(true, _) => other.included.clone(),
			(_, true) => self.included.clone(),
			_ => self
				.included
				.iter()
				.filter(|s| other.included.contains(s))
				.copied()
				.collect(),
		};
		let mut excluded = self.excluded.clone();
		excluded.extend(other.excluded.iter().filter(|s| !self.excluded.contains(s)));
		SourceFilters { included, excluded }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_flags_union_and_iteration() {
		let flags = LiquiditySource::UniswapV2.flag() | LiquiditySource::Curve.flag();
		assert!(flags.contains(LiquiditySource::UniswapV2));
		assert!(flags.contains(LiquiditySource::Curve));
		assert!(!flags.contains(LiquiditySource::Native));
		assert_eq!(
			flags.iter().collect::<Vec<_>>(),
			vec![LiquiditySource::UniswapV2, LiquiditySource::Curve]
		);
		assert!(flags.contains_all(LiquiditySource::Curve.into()));
	}

	#[test]
	fn test_source_filters() {
		let exclude_curve = SourceFilters {
			included: vec![],
			excluded: vec![LiquiditySource::Curve],
		};
		let only_uni = SourceFilters {
			included: vec![LiquiditySource::UniswapV2, LiquiditySource::Curve],
			excluded: vec![],
		};
		let merged = exclude_curve.merge(&only_uni);
		assert!(merged.is_allowed(LiquiditySource::UniswapV2));
		assert!(!merged.is_allowed(LiquiditySource::Curve));
		assert!(!merged.is_allowed(LiquiditySource::Balancer));
	}

	#[test]
	fn test_wire_names() {
		assert_eq!(
			LiquiditySource::from_name("Uniswap_V3"),
			Some(LiquiditySource::UniswapV3)
		);
		assert_eq!(
			serde_json::to_string(&LiquiditySource::UniswapV2).unwrap(),
			"\"Uniswap_V2\""
		);
	}
}
