//! Configuration loading for the asset swapper.
//!
//! Configuration is read from TOML, `${VAR}` references are replaced with
//! environment values, a few settings can be overridden from prefixed
//! environment variables, and the result is validated before use.

use std::env;
use std::path::Path;
use swapper_pools::implementations::subgraph::BalancerSubgraphFetcherSchema;
use swapper_sampler::implementations::rpc::RpcSamplerSchema;
use swapper_types::ConfigSchema;
use thiserror::Error;
use tracing::debug;

pub mod types;

pub use types::{PoolsSettings, QuoterSettings, SamplerSettings, SwapperConfig, SwapperSettings};

/// Sampler backends the loader accepts.
const SAMPLER_BACKENDS: [&str; 1] = ["rpc"];

#[derive(Error, Debug)]
pub enum ConfigError {
	/// No file was given or it does not exist.
	#[error("File not found: {0}")]
	FileNotFound(String),

	/// The TOML is malformed or does not match the expected shape.
	#[error("Parse error: {0}")]
	ParseError(String),

	/// The configuration parsed but is not usable.
	#[error("Validation error: {0}")]
	ValidationError(String),

	/// A `${VAR}` reference names an unset variable.
	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	/// Reading the file failed.
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "SWAPPER_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<SwapperConfig, ConfigError> {
		let Some(file_path) = &self.file_path else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};
		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		let mut config = Self::parse(&content)?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	/// Parses and validates a TOML string without applying overrides.
	pub fn from_toml(content: &str) -> Result<SwapperConfig, ConfigError> {
		let config = Self::parse(content)?;
		validate_config(&config)?;
		Ok(config)
	}

	fn parse(content: &str) -> Result<SwapperConfig, ConfigError> {
		let substituted = substitute_env_vars(content)?;
		toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn apply_env_overrides(&self, config: &mut SwapperConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			debug!("Overriding log level from environment");
			config.swapper.log_level = log_level;
		}

		if let Ok(rpc_url) = env::var(format!("{}RPC_URL", self.env_prefix)) {
			debug!("Overriding sampler RPC URL from environment");
			match config.sampler.config.as_table_mut() {
				Some(table) => {
					table.insert("rpc_url".to_string(), toml::Value::String(rpc_url));
				}
				None => {
					return Err(ConfigError::ValidationError(
						"sampler.config must be a table".to_string(),
					))
				}
			}
		}

		if let Ok(gas_price) = env::var(format!("{}GAS_PRICE_GWEI", self.env_prefix)) {
			config.swapper.gas_price_gwei = gas_price
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid gas price: {}", e)))?;
		}

		Ok(())
	}
}

/// Replaces every `${VAR_NAME}` with the variable's value.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
	let mut result = content.to_string();

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

/// Checks the cross-field rules the types alone cannot express.
pub fn validate_config(config: &SwapperConfig) -> Result<(), ConfigError> {
	let quoter = &config.quoter;
	for (name, value) in [
		("bridge_slippage", quoter.bridge_slippage),
		("max_fallback_slippage", quoter.max_fallback_slippage),
	] {
		if value.is_sign_negative() || value > rust_decimal::Decimal::ONE {
			return Err(ConfigError::ValidationError(format!(
				"quoter.{} must be within [0, 1], got {}",
				name, value
			)));
		}
	}

	if quoter.num_samples < 1 {
		return Err(ConfigError::ValidationError(
			"quoter.num_samples must be at least 1".to_string(),
		));
	}

	if !(quoter.sample_distribution_base > 0.0) {
		return Err(ConfigError::ValidationError(
			"quoter.sample_distribution_base must be positive".to_string(),
		));
	}

	let pools = &config.pools;
	if pools.foreground_ttl_ms > pools.sampling_max_age_ms
		|| pools.sampling_max_age_ms > pools.background_ttl_ms
	{
		return Err(ConfigError::ValidationError(
			"pool lifetimes must satisfy foreground_ttl_ms <= sampling_max_age_ms <= background_ttl_ms"
				.to_string(),
		));
	}

	if !SAMPLER_BACKENDS.contains(&config.sampler.backend.as_str()) {
		return Err(ConfigError::ValidationError(format!(
			"Unknown sampler backend '{}'",
			config.sampler.backend
		)));
	}
	RpcSamplerSchema
		.validate(&config.sampler.config)
		.map_err(|e| ConfigError::ValidationError(format!("sampler.config: {}", e)))?;

	let fetcher_configured = config
		.pools
		.fetcher
		.as_table()
		.is_some_and(|table| !table.is_empty());
	if fetcher_configured {
		BalancerSubgraphFetcherSchema
			.validate(&config.pools.fetcher)
			.map_err(|e| ConfigError::ValidationError(format!("pools.fetcher: {}", e)))?;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use swapper_types::LiquiditySource;
	use tempfile::NamedTempFile;

	const BASE_CONFIG: &str = r#"
[swapper]
chain_id = 1
log_level = "debug"
gas_price_gwei = 25

[quoter]
num_samples = 7
bridge_slippage = "0.01"

[sources]
weth = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
uniswap_v2_router = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d"

[source_filters]
excluded = ["Curve"]

[sampler]
backend = "rpc"

[sampler.config]
rpc_url = "http://localhost:8545"
sampler_address = "0x5555555555555555555555555555555555555555"

[pools.fetcher]
subgraph_url = "https://example.com/subgraphs/balancer"
top_pools_count = 100

[[rfq.makers]]
uri = "https://maker.example.com"

[contracts]
exchange_proxy = "0xdef1c0ded9bec7f1a1670819833240f027b25eff"
transformer_deployer = "0x0000000000000000000000000000000000000000"
ether_token = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"

[contracts.transformers]
weth_transformer = "0x1111111111111111111111111111111111111111"
pay_taker_transformer = "0x2222222222222222222222222222222222222222"
fill_quote_transformer = "0x3333333333333333333333333333333333333333"
affiliate_fee_transformer = "0x4444444444444444444444444444444444444444"
positive_slippage_fee_transformer = "0x6666666666666666666666666666666666666666"
"#;

	#[test]
	fn test_from_toml_applies_defaults() {
		let config = ConfigLoader::from_toml(BASE_CONFIG).unwrap();
		assert_eq!(config.swapper.chain_id, 1);
		assert_eq!(config.quoter.num_samples, 7);
		assert_eq!(config.quoter.bridge_slippage, rust_decimal::Decimal::new(1, 2));
		// Unset quoter fields keep their defaults.
		assert_eq!(config.quoter.protocol_fee_multiplier, 70_000);
		assert_eq!(config.pools.foreground_ttl_ms, 3_000);
		assert_eq!(config.rfq.makers.len(), 1);
		assert_eq!(config.rfq.maker_timeout_ms, 600);
		assert!(!config.source_filters.is_allowed(LiquiditySource::Curve));
		assert!(config.source_filters.is_allowed(LiquiditySource::UniswapV2));
	}

	#[test]
	fn test_validation_rules() {
		let bad_slippage = BASE_CONFIG.replace("bridge_slippage = \"0.01\"", "bridge_slippage = \"1.5\"");
		assert!(matches!(
			ConfigLoader::from_toml(&bad_slippage),
			Err(ConfigError::ValidationError(_))
		));

		let no_samples = BASE_CONFIG.replace("num_samples = 7", "num_samples = 0");
		assert!(matches!(
			ConfigLoader::from_toml(&no_samples),
			Err(ConfigError::ValidationError(_))
		));

		let unknown_backend = BASE_CONFIG.replace("backend = \"rpc\"", "backend = \"ipc\"");
		assert!(matches!(
			ConfigLoader::from_toml(&unknown_backend),
			Err(ConfigError::ValidationError(_))
		));

		let bad_url = BASE_CONFIG.replace("http://localhost:8545", "localhost:8545");
		assert!(matches!(
			ConfigLoader::from_toml(&bad_url),
			Err(ConfigError::ValidationError(_))
		));

		let unordered = format!(
			"{}\n[pools]\nforeground_ttl_ms = 7200000\n",
			BASE_CONFIG.replace("[pools.fetcher]\nsubgraph_url = \"https://example.com/subgraphs/balancer\"\ntop_pools_count = 100\n", "")
		);
		assert!(matches!(
			ConfigLoader::from_toml(&unordered),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn test_env_var_substitution() {
		env::set_var("SWAPPER_TEST_SAMPLER_URL", "https://rpc.example.com");
		let config = ConfigLoader::from_toml(
			&BASE_CONFIG.replace("http://localhost:8545", "${SWAPPER_TEST_SAMPLER_URL}"),
		)
		.unwrap();
		assert_eq!(
			config.sampler.config.get("rpc_url").and_then(|v| v.as_str()),
			Some("https://rpc.example.com")
		);

		let missing = BASE_CONFIG.replace("http://localhost:8545", "${SWAPPER_TEST_UNSET_VAR}");
		assert!(matches!(
			ConfigLoader::from_toml(&missing),
			Err(ConfigError::EnvVarNotFound(name)) if name == "SWAPPER_TEST_UNSET_VAR"
		));
	}

	#[tokio::test]
	async fn test_load_from_file_with_overrides() {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(BASE_CONFIG.as_bytes()).unwrap();

		env::set_var("SWAPPERTEST_LOG_LEVEL", "trace");
		env::set_var("SWAPPERTEST_RPC_URL", "https://override.example.com");
		env::set_var("SWAPPERTEST_GAS_PRICE_GWEI", "42");

		let config = ConfigLoader::new()
			.with_file(file.path())
			.with_env_prefix("SWAPPERTEST_")
			.load()
			.await
			.unwrap();
		assert_eq!(config.swapper.log_level, "trace");
		assert_eq!(config.swapper.gas_price_gwei, 42);
		assert_eq!(
			config.sampler.config.get("rpc_url").and_then(|v| v.as_str()),
			Some("https://override.example.com")
		);
	}

	#[tokio::test]
	async fn test_missing_file() {
		let result = ConfigLoader::new()
			.with_file("/nonexistent/swapper.toml")
			.load()
			.await;
		assert!(matches!(result, Err(ConfigError::FileNotFound(_))));

		let result = ConfigLoader::new().load().await;
		assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
	}
}
