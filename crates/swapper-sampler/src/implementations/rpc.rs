//! Sampler backend that `eth_call`s a deployed sampler contract over JSON-RPC.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use swapper_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use tracing::debug;

use crate::abi::IERC20BridgeSampler;
use crate::{CallResult, SamplerError, SamplerInterface};

#[derive(Debug, Deserialize)]
struct RpcResponse {
	result: Option<String>,
	error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
	code: i64,
	message: String,
}

/// JSON-RPC sampler backend.
pub struct RpcSampler {
	client: reqwest::Client,
	rpc_url: String,
	sampler_address: Address,
	gas_limit: Option<u64>,
}

impl RpcSampler {
	pub fn new(
		rpc_url: impl Into<String>,
		sampler_address: Address,
		gas_limit: Option<u64>,
		timeout: Duration,
	) -> Result<Self, SamplerError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| SamplerError::InvalidConfig(e.to_string()))?;
		Ok(Self {
			client,
			rpc_url: rpc_url.into(),
			sampler_address,
			gas_limit,
		})
	}

	fn call_object(&self, data: &[u8]) -> serde_json::Value {
		let mut call = json!({
			"to": format!("{:#x}", self.sampler_address),
			"data": format!("0x{}", hex::encode(data)),
		});
		if let Some(gas) = self.gas_limit {
			call["gas"] = json!(format!("{gas:#x}"));
		}
		call
	}
}

fn decode_hex(value: &str) -> Result<Vec<u8>, SamplerError> {
	hex::decode(value.trim_start_matches("0x")).map_err(|e| SamplerError::Decode(e.to_string()))
}

#[async_trait]
impl SamplerInterface for RpcSampler {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RpcSamplerSchema)
	}

	async fn batch_call(&self, calls: Vec<Bytes>) -> Result<Vec<CallResult>, SamplerError> {
		let call_count = calls.len();
		let data = IERC20BridgeSampler::batchCallCall { callDatas: calls }.abi_encode();
		let request = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": "eth_call",
			"params": [self.call_object(&data), "latest"],
		});

		debug!(calls = call_count, "Sending sampler batch");
		let response: RpcResponse = self
			.client
			.post(&self.rpc_url)
			.json(&request)
			.send()
			.await
			.map_err(|e| SamplerError::Transport(e.to_string()))?
			.json()
			.await
			.map_err(|e| SamplerError::Decode(e.to_string()))?;

		if let Some(error) = response.error {
			return Err(SamplerError::Rpc(format!("{} ({})", error.message, error.code)));
		}
		let raw = response
			.result
			.ok_or_else(|| SamplerError::Rpc("empty eth_call result".into()))?;
		let bytes = decode_hex(&raw)?;
		let decoded = IERC20BridgeSampler::batchCallCall::abi_decode_returns(&bytes, true)
			.map_err(|e| SamplerError::Decode(e.to_string()))?;

		Ok(decoded
			.callResults
			.into_iter()
			.map(|r| CallResult {
				data: r.data,
				success: r.success,
			})
			.collect())
	}
}

/// Configuration schema for RpcSampler.
pub struct RpcSamplerSchema;

impl ConfigSchema for RpcSamplerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![
				Field::new("rpc_url", FieldType::String).with_validator(|v| match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("rpc_url must be an http(s) url".to_string()),
				}),
				Field::new("sampler_address", FieldType::Address),
			],
			// Optional fields
			vec![
				Field::new(
					"gas_limit",
					FieldType::Integer {
						min: Some(21_000),
						max: None,
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

/// Factory function to create a sampler backend from configuration.
///
/// Configuration parameters:
/// - `rpc_url`: JSON-RPC endpoint of the chain
/// - `sampler_address`: Address of the deployed sampler contract
/// - `gas_limit`: Gas allowance of the `eth_call` (default: node default)
/// - `request_timeout_ms`: HTTP timeout per batch (default: 10000)
pub fn create_sampler(config: &toml::Value) -> Result<Box<dyn SamplerInterface>, SamplerError> {
	RpcSamplerSchema
		.validate(config)
		.map_err(|e| SamplerError::InvalidConfig(e.to_string()))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.unwrap_or_default()
		.to_string();
	let sampler_address = config
		.get("sampler_address")
		.and_then(|v| v.as_str())
		.map(Address::from_str)
		.transpose()
		.map_err(|e| SamplerError::InvalidConfig(e.to_string()))?
		.unwrap_or_default();
	let gas_limit = config
		.get("gas_limit")
		.and_then(|v| v.as_integer())
		.map(|g| g as u64);
	let timeout_ms = config
		.get("request_timeout_ms")
		.and_then(|v| v.as_integer())
		.unwrap_or(10_000) as u64;

	Ok(Box::new(RpcSampler::new(
		rpc_url,
		sampler_address,
		gas_limit,
		Duration::from_millis(timeout_ms),
	)?))
}
