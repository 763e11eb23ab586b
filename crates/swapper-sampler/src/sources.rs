//! Static description of the liquidity sources available on a chain.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use swapper_types::CurvePool;

/// Router and quoter of a Uniswap V3 deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniswapV3Addresses {
	pub router: Address,
	pub quoter: Address,
}

/// A PLP-style liquidity provider contract and the tokens it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityProviderConfig {
	pub address: Address,
	pub tokens: Vec<Address>,
	#[serde(default)]
	pub gas_cost: Option<u64>,
}

/// Tokens worth routing through when no direct route is good enough.
///
/// A token with its own entry uses that list; every other token uses `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAdjacencyGraph {
	#[serde(default)]
	pub default: Vec<Address>,
	#[serde(default)]
	pub adjacency: HashMap<Address, Vec<Address>>,
}

impl TokenAdjacencyGraph {
	/// Intermediate tokens for a pair, never including either side of it.
	pub fn intermediate_tokens(&self, taker_token: Address, maker_token: Address) -> Vec<Address> {
		let lookup = |token: &Address| self.adjacency.get(token).unwrap_or(&self.default);
		let mut tokens: Vec<Address> = Vec::new();
		for t in lookup(&taker_token).iter().chain(lookup(&maker_token).iter()) {
			if *t != taker_token && *t != maker_token && !tokens.contains(t) {
				tokens.push(*t);
			}
		}
		tokens
	}
}

/// Every source the sampler knows how to query on one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
	/// Wrapped native token; DEX routes through it are sampled as separate paths.
	pub weth: Address,
	#[serde(default)]
	pub uniswap_v2_router: Option<Address>,
	#[serde(default)]
	pub sushiswap_router: Option<Address>,
	#[serde(default)]
	pub pancakeswap_router: Option<Address>,
	#[serde(default)]
	pub uniswap_v3: Option<UniswapV3Addresses>,
	#[serde(default)]
	pub curve_pools: Vec<CurvePool>,
	#[serde(default)]
	pub liquidity_providers: Vec<LiquidityProviderConfig>,
	#[serde(default)]
	pub token_adjacency: TokenAdjacencyGraph,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_intermediate_tokens() {
		let a = Address::repeat_byte(1);
		let b = Address::repeat_byte(2);
		let weth = Address::repeat_byte(3);
		let usdc = Address::repeat_byte(4);
		let dai = Address::repeat_byte(5);

		let mut adjacency = HashMap::new();
		adjacency.insert(a, vec![usdc, b]);
		let graph = TokenAdjacencyGraph {
			default: vec![weth, dai],
			adjacency,
		};

		assert_eq!(graph.intermediate_tokens(a, b), vec![usdc, weth, dai]);
		assert_eq!(graph.intermediate_tokens(weth, b), vec![dai]);
	}
}
