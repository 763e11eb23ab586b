//! Weighted pool discovery through a Balancer-style GraphQL subgraph.

use alloy_primitives::utils::{parse_units, ParseUnits};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use swapper_types::{ConfigSchema, Field, FieldType, Pool, PoolToken, Schema, ValidationError};
use tracing::debug;

use crate::{PoolCacheError, PoolFetcherInterface};

const TOP_POOLS_QUERY: &str = r#"
query fetchTopPools($first: Int!) {
	pools(
		first: $first
		where: { publicSwap: true, liquidity_gt: 0 }
		orderBy: swapsCount
		orderDirection: desc
	) {
		id
		swapFee
		totalWeight
		tokensList
		tokens { address balance decimals denormWeight }
	}
}"#;

const PAIR_POOLS_QUERY: &str = r#"
query fetchPairPools($tokens: [Bytes!]!) {
	pools(
		first: 1000
		where: { publicSwap: true, liquidity_gt: 0, tokensList_contains: $tokens }
	) {
		id
		swapFee
		totalWeight
		tokensList
		tokens { address balance decimals denormWeight }
	}
}"#;

/// Weights and fees are 1e18 fixed point on chain.
const WEIGHT_DECIMALS: u8 = 18;

#[derive(Debug, Deserialize)]
struct GraphResponse {
	data: Option<PoolsData>,
	errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PoolsData {
	pools: Vec<SubgraphPool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubgraphPool {
	id: String,
	swap_fee: String,
	total_weight: String,
	tokens: Vec<SubgraphToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubgraphToken {
	address: String,
	balance: String,
	decimals: u8,
	denorm_weight: String,
}

/// Parses a decimal string into `decimals` fixed point, dropping digits past
/// that precision.
fn parse_fixed(field: &str, value: &str, decimals: u8) -> Result<U256, PoolCacheError> {
	let malformed =
		|reason: String| PoolCacheError::MalformedResponse(format!("{field} '{value}': {reason}"));
	if value.starts_with('-') {
		return Err(malformed("negative".into()));
	}
	let truncated = match value.split_once('.') {
		Some((whole, fraction)) if fraction.len() > decimals as usize => {
			if decimals == 0 {
				whole
			} else {
				value.get(..whole.len() + 1 + decimals as usize).unwrap_or(value)
			}
		}
		_ => value,
	};
	parse_units(truncated, decimals)
		.map(ParseUnits::get_absolute)
		.map_err(|e| malformed(e.to_string()))
}

fn parse_address(value: &str) -> Result<Address, PoolCacheError> {
	Address::from_str(value)
		.map_err(|e| PoolCacheError::MalformedResponse(format!("address '{value}': {e}")))
}

impl SubgraphPool {
	fn into_pool(self) -> Result<Pool, PoolCacheError> {
		let total_weight = parse_fixed("totalWeight", &self.total_weight, WEIGHT_DECIMALS)?;
		if total_weight.is_zero() {
			return Err(PoolCacheError::MalformedResponse(format!(
				"pool {} has no weight",
				self.id
			)));
		}
		let tokens = self
			.tokens
			.into_iter()
			.map(|t| {
				Ok(PoolToken {
					address: parse_address(&t.address)?,
					balance: parse_fixed("balance", &t.balance, t.decimals)?,
					decimals: t.decimals,
					weight: parse_fixed("denormWeight", &t.denorm_weight, WEIGHT_DECIMALS)?,
				})
			})
			.collect::<Result<Vec<_>, PoolCacheError>>()?;

		Ok(Pool {
			id: parse_address(&self.id)?,
			swap_fee: parse_fixed("swapFee", &self.swap_fee, WEIGHT_DECIMALS)?,
			tokens,
		})
	}
}

/// Pool fetcher backed by a GraphQL subgraph.
pub struct BalancerSubgraphFetcher {
	client: reqwest::Client,
	subgraph_url: String,
	top_pools_count: usize,
}

impl BalancerSubgraphFetcher {
	pub fn new(subgraph_url: impl Into<String>, top_pools_count: usize, timeout: Duration) -> Self {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.unwrap_or_default();
		Self {
			client,
			subgraph_url: subgraph_url.into(),
			top_pools_count,
		}
	}

	async fn query(&self, query: &str, variables: serde_json::Value) -> Result<Vec<Pool>, PoolCacheError> {
		let response = self
			.client
			.post(&self.subgraph_url)
			.json(&json!({ "query": query, "variables": variables }))
			.send()
			.await
			.map_err(|e| PoolCacheError::Http(e.to_string()))?
			.error_for_status()
			.map_err(|e| PoolCacheError::Http(e.to_string()))?;

		let body: GraphResponse = response
			.json()
			.await
			.map_err(|e| PoolCacheError::MalformedResponse(e.to_string()))?;
		if let Some(errors) = body.errors {
			return Err(PoolCacheError::MalformedResponse(errors.to_string()));
		}
		let data = body
			.data
			.ok_or_else(|| PoolCacheError::MalformedResponse("missing data".into()))?;

		// A single malformed pool is skipped rather than failing the whole batch.
		let pools: Vec<Pool> = data
			.pools
			.into_iter()
			.filter_map(|p| match p.into_pool() {
				Ok(pool) => Some(pool),
				Err(e) => {
					debug!(error = %e, "Skipping malformed pool");
					None
				}
			})
			.collect();
		Ok(pools)
	}
}

/// Configuration schema for BalancerSubgraphFetcher.
pub struct BalancerSubgraphFetcherSchema;

impl ConfigSchema for BalancerSubgraphFetcherSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new("subgraph_url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("subgraph_url must be an http(s) url".to_string()),
				}
			})],
			// Optional fields
			vec![
				Field::new(
					"top_pools_count",
					FieldType::Integer {
						min: Some(1),
						max: Some(1000),
					},
				),
				Field::new(
					"request_timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl PoolFetcherInterface for BalancerSubgraphFetcher {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(BalancerSubgraphFetcherSchema)
	}

	async fn fetch_top_pools(&self) -> Result<Vec<Pool>, PoolCacheError> {
		self.query(TOP_POOLS_QUERY, json!({ "first": self.top_pools_count }))
			.await
	}

	async fn fetch_pools_for_pair(
		&self,
		taker_token: Address,
		maker_token: Address,
	) -> Result<Vec<Pool>, PoolCacheError> {
		let tokens = [
			format!("{:#x}", taker_token),
			format!("{:#x}", maker_token),
		];
		self.query(PAIR_POOLS_QUERY, json!({ "tokens": tokens }))
			.await
	}
}

/// Factory function to create a pool fetcher from configuration.
///
/// Configuration parameters:
/// - `subgraph_url`: GraphQL endpoint to query
/// - `top_pools_count`: Pools fetched by the background refresh (default: 250)
/// - `request_timeout_ms`: HTTP timeout per query (default: 10000)
pub fn create_pool_fetcher(config: &toml::Value) -> Box<dyn PoolFetcherInterface> {
	let subgraph_url = config
		.get("subgraph_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://api.thegraph.com/subgraphs/name/balancer-labs/balancer")
		.to_string();
	let top_pools_count = config
		.get("top_pools_count")
		.and_then(|v| v.as_integer())
		.unwrap_or(250) as usize;
	let timeout_ms = config
		.get("request_timeout_ms")
		.and_then(|v| v.as_integer())
		.unwrap_or(10_000) as u64;

	Box::new(BalancerSubgraphFetcher::new(
		subgraph_url,
		top_pools_count,
		Duration::from_millis(timeout_ms),
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_subgraph_pool() {
		let raw: GraphResponse = serde_json::from_str(
			r#"{
				"data": { "pools": [{
					"id": "0x1eff8af5d577060ba4ac8a29a13525bb0ee2a3d5",
					"swapFee": "0.0025",
					"totalWeight": "50",
					"tokensList": [],
					"tokens": [
						{ "address": "0x6b175474e89094c44da98b954eedeac495271d0f", "balance": "1200.5", "decimals": 18, "denormWeight": "10" },
						{ "address": "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", "balance": "3.25", "decimals": 18, "denormWeight": "40" }
					]
				}]}
			}"#,
		)
		.unwrap();
		let pool = raw
			.data
			.unwrap()
			.pools
			.into_iter()
			.next()
			.unwrap()
			.into_pool()
			.unwrap();
		assert_eq!(pool.swap_fee, U256::from(2_500_000_000_000_000u64));
		assert_eq!(pool.tokens[0].weight, U256::from(10_000_000_000_000_000_000u128));
		assert_eq!(pool.tokens[0].balance, U256::from(1_200_500_000_000_000_000_000u128));
		assert_eq!(pool.tokens[1].balance, U256::from(3_250_000_000_000_000_000u64));
	}

	#[test]
	fn test_parse_fixed_is_exact() {
		assert_eq!(
			parse_fixed("balance", "1.1234567", 6).unwrap(),
			U256::from(1_123_456u64)
		);
		assert_eq!(parse_fixed("balance", "42.9", 0).unwrap(), U256::from(42u64));
		assert_eq!(
			parse_fixed("balance", "123456789012345678901234.000000000000000001", 18).unwrap(),
			"123456789012345678901234000000000000000001".parse::<U256>().unwrap()
		);
		assert!(parse_fixed("balance", "-1", 18).is_err());
		assert!(parse_fixed("balance", "lots", 18).is_err());
	}

	#[test]
	fn test_schema_and_factory() {
		let config: toml::Value = toml::from_str(
			r#"
			subgraph_url = "https://example.org/graphql"
			top_pools_count = 50
			"#,
		)
		.unwrap();
		assert!(BalancerSubgraphFetcherSchema.validate(&config).is_ok());
		let fetcher = create_pool_fetcher(&config);
		assert!(fetcher.config_schema().validate(&config).is_ok());

		let bad: toml::Value = toml::from_str(r#"subgraph_url = "ftp://nope""#).unwrap();
		assert!(BalancerSubgraphFetcherSchema.validate(&bad).is_err());
	}
}
