//! Shared domain types for the asset swapper.
//!
//! Every crate in the workspace speaks in these types: liquidity sources and
//! their flags, samples and fills, native 0x orders, optimized orders and the
//! final swap quote handed to the calldata encoder.

pub mod fill;
pub mod order;
pub mod pool;
pub mod quote;
pub mod source;
pub mod validation;

pub use fill::*;
pub use order::*;
pub use pool::*;
pub use quote::*;
pub use source::*;
pub use validation::*;

pub use alloy_primitives::{address, Address, Bytes, B256, U256};

/// Sentinel meaning "the entire balance" when used as a fill amount.
pub const MAX_UINT256: U256 = U256::MAX;

/// Address standing in for the chain's native asset.
pub const ETH_TOKEN_ADDRESS: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// The zero address.
pub const NULL_ADDRESS: Address = Address::ZERO;

/// One whole unit of an 18-decimal token, also one ether in wei.
pub const ONE_ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Well-known chain identifiers the encoder distinguishes between.
pub mod chain_id {
	pub const MAINNET: u64 = 1;
	pub const BSC: u64 = 56;
	pub const POLYGON: u64 = 137;
}

/// Returns the current unix time in seconds.
pub fn current_timestamp() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
