//! Pool descriptions shared by the pool cache and the off-chain sampler.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A token held by a weighted pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolToken {
	pub address: Address,
	/// Balance in base units.
	pub balance: U256,
	pub decimals: u8,
	/// Denormalized weight, 1e18 fixed point.
	pub weight: U256,
}

/// A weighted AMM pool as reported by pool discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
	pub id: Address,
	/// Swap fee as a 1e18 fixed-point fraction, `3e15` for 0.3%.
	pub swap_fee: U256,
	pub tokens: Vec<PoolToken>,
}

impl Pool {
	pub fn token(&self, address: Address) -> Option<&PoolToken> {
		self.tokens.iter().find(|t| t.address == address)
	}

	pub fn contains_pair(&self, a: Address, b: Address) -> bool {
		a != b && self.token(a).is_some() && self.token(b).is_some()
	}
}

/// Order-independent cache key for a token pair.
///
/// Both addresses are lower-cased and sorted, then joined by `-`.
pub fn pair_key(a: Address, b: Address) -> String {
	let mut pair = [
		format!("{:#x}", a).to_lowercase(),
		format!("{:#x}", b).to_lowercase(),
	];
	pair.sort();
	pair.join("-")
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_pair_key_is_order_independent() {
		let a = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
		let b = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
		assert_eq!(pair_key(a, b), pair_key(b, a));
		assert!(pair_key(a, b).starts_with("0x6b17"));
	}
}
