//! Calldata encoding for 0x exchange proxy swaps.
//!
//! [`ExchangeProxySwapQuoteConsumer`] turns a [`SwapQuote`] into the
//! transaction a taker submits: a VIP direct swap when the route allows it,
//! a Multiplex batch or multi-hop sell on mainnet, and otherwise a
//! `transformERC20` call chaining the WETH, FillQuote, fee and PayTaker
//! transformers.
//!
//! [`SwapQuote`]: swapper_types::SwapQuote

use alloy_primitives::Address;
use swapper_types::LiquiditySource;
use thiserror::Error;

pub mod abi;
pub mod bridge;
pub mod consumer;
pub mod multiplex;
pub mod transformers;

pub use consumer::{
	AffiliateFee, AffiliateFeeType, CalldataInfo, CalldataOpts, ContractAddresses,
	ExchangeProxySwapQuoteConsumer, TransformerAddresses,
};
pub use transformers::{find_transformer_nonce, TransformerNonces};

/// Errors that can occur while encoding a quote into calldata.
#[derive(Debug, Error)]
pub enum ConsumerError {
	/// Fees taken in the sell token cannot be settled by the exchange proxy.
	#[error("Affiliate fees denominated in sell token are not yet supported")]
	UnsupportedFee,
	/// The quote is internally inconsistent.
	#[error("Invalid quote: {0}")]
	InvalidQuote(String),
	/// The order's source has no bridge adapter.
	#[error("Unsupported liquidity source: {0}")]
	UnsupportedSource(LiquiditySource),
	/// The transformer was not deployed by the configured deployer.
	#[error("{deployer} did not deploy {transformer}")]
	UnknownTransformer { transformer: Address, deployer: Address },
}
