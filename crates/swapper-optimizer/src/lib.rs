//! Fill normalization and path optimization.
//!
//! Samples, native orders and RFQ quotes are normalized into [`Fill`]s with
//! gas priced in, and [`PathOptimizer`] picks the mix of fills that best
//! covers the requested input, plus an optional fallback path.
//!
//! [`Fill`]: swapper_types::Fill

use rust_decimal::Decimal;
use thiserror::Error;

pub mod fills;
pub mod optimizer;
pub mod path;
mod rate;

pub use fills::{
	dex_samples_to_fills, eth_to_output_amount, native_orders_to_fills, two_hop_sample_to_fill,
	FillOpts, GasSchedule,
};
pub use optimizer::{ExchangeProxyOverhead, OptimizedPath, OptimizerOpts, PathOptimizer};
pub use path::{get_slipped_orders, Path};
pub use rate::{mul_div, Rate};

/// Errors that can occur while optimizing a path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptimizerError {
	/// No combination of fills covers the requested amount.
	#[error("No optimal path covers the requested amount")]
	NoOptimalPath,
	/// There were no usable fills at all.
	#[error("No liquidity available")]
	NoLiquidity,
	/// Slippage must lie in [0, 1].
	#[error("Invalid slippage: {0}")]
	InvalidSlippage(Decimal),
}
