//! Swap quote assembly.
//!
//! [`SwapQuoter`] gathers liquidity for a market sell or buy (on-chain
//! samples, cached pools, native and RFQ orders), runs the path optimizer
//! and wraps the result into a [`SwapQuote`] with best and worst case
//! amounts, a source breakdown and an optional quote report.
//!
//! [`SwapQuote`]: swapper_types::SwapQuote

use swapper_optimizer::OptimizerError;
use swapper_sampler::SamplerError;
use swapper_types::MarketOperation;
use thiserror::Error;

pub mod quote_info;
pub mod quoter;
pub mod report;

pub use quote_info::{calculate_quote_info, QuoteInfoOpts, QuoteInfos};
pub use quoter::{
	MarketQuoteRequest, MarketSideLiquidity, RfqMode, RfqQuoteOpts, SwapQuoter, SwapQuoterOpts,
};
pub use report::{generate_quote_report, get_comparison_price};

/// Errors that can occur while building a quote.
#[derive(Debug, Error)]
pub enum QuoteError {
	/// The sources cannot fill the requested amount.
	#[error("Insufficient asset liquidity for {field}")]
	InsufficientAssetLiquidity { field: String },
	/// No source trades the pair at all.
	#[error("Asset unavailable for {field}")]
	AssetUnavailable { field: String },
	/// On-chain sampling failed.
	#[error("Sampler error: {0}")]
	Sampler(#[from] SamplerError),
	/// The request itself is unusable.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
}

impl QuoteError {
	/// Maps an optimizer failure onto the amount field of the request.
	pub fn from_optimizer(error: OptimizerError, side: MarketOperation) -> Self {
		let field = match side {
			MarketOperation::Sell => "sellAmount",
			MarketOperation::Buy => "buyAmount",
		}
		.to_string();
		match error {
			OptimizerError::NoOptimalPath => QuoteError::InsufficientAssetLiquidity { field },
			OptimizerError::NoLiquidity => QuoteError::AssetUnavailable { field },
			OptimizerError::InvalidSlippage(s) => {
				QuoteError::InvalidRequest(format!("slippage {} is outside [0, 1]", s))
			}
		}
	}
}
