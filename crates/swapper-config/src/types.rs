//! Configuration types for the asset swapper.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use swapper_consumer::ContractAddresses;
use swapper_optimizer::GasSchedule;
use swapper_sampler::{RfqConfig, SourcesConfig};
use swapper_types::SourceFilters;

/// Complete swapper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwapperConfig {
	/// Chain and process settings
	pub swapper: SwapperSettings,
	/// Quote assembly defaults
	#[serde(default)]
	pub quoter: QuoterSettings,
	/// Liquidity sources deployed on the chain
	pub sources: SourcesConfig,
	/// Sources every request is restricted to
	#[serde(default)]
	pub source_filters: SourceFilters,
	/// On-chain sampler backend
	pub sampler: SamplerSettings,
	/// Balancer pool cache
	#[serde(default)]
	pub pools: PoolsSettings,
	/// RFQ makers
	#[serde(default)]
	pub rfq: RfqConfig,
	/// Exchange proxy and transformer deployments
	pub contracts: ContractAddresses,
}

fn default_log_level() -> String {
	"info".to_string()
}

/// Chain and process settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwapperSettings {
	pub chain_id: u64,
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Gas price assumed when a request does not carry one
	#[serde(default)]
	pub gas_price_gwei: u64,
}

/// Quote assembly defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuoterSettings {
	pub num_samples: usize,
	pub sample_distribution_base: f64,
	pub bridge_slippage: Decimal,
	pub max_fallback_slippage: Decimal,
	pub allow_fallback: bool,
	/// Gas units charged as protocol fee per limit order
	pub protocol_fee_multiplier: u64,
	/// Flat gas of routing through the exchange proxy
	pub exchange_proxy_overhead_gas: u64,
	pub pool_fetch_timeout_ms: u64,
	pub gas_schedule: GasSchedule,
}

impl Default for QuoterSettings {
	fn default() -> Self {
		Self {
			num_samples: 13,
			sample_distribution_base: 1.05,
			bridge_slippage: Decimal::new(5, 3),
			max_fallback_slippage: Decimal::new(5, 2),
			allow_fallback: true,
			protocol_fee_multiplier: 70_000,
			exchange_proxy_overhead_gas: 0,
			pool_fetch_timeout_ms: 1_000,
			gas_schedule: GasSchedule::default(),
		}
	}
}

/// On-chain sampler backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplerSettings {
	/// Backend name, currently only "rpc"
	pub backend: String,
	/// Backend-specific table, validated by the backend's schema
	pub config: toml::Value,
}

/// Pool cache lifetimes and refresh cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolsSettings {
	pub foreground_ttl_ms: u64,
	pub background_ttl_ms: u64,
	pub sampling_max_age_ms: u64,
	pub max_pools_fetched: usize,
	pub refresh_interval_secs: u64,
	/// Fetcher-specific table, validated by the fetcher's schema
	pub fetcher: toml::Value,
}

impl Default for PoolsSettings {
	fn default() -> Self {
		Self {
			foreground_ttl_ms: 3_000,
			background_ttl_ms: 24 * 60 * 60 * 1000,
			sampling_max_age_ms: 60 * 60 * 1000,
			max_pools_fetched: 3,
			refresh_interval_secs: 12 * 60 * 60,
			fetcher: toml::Value::Table(toml::map::Map::new()),
		}
	}
}
