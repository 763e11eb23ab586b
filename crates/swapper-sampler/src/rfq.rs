//! Off-chain RFQ quotes from market makers.
//!
//! Standard makers speak the quote-server protocol (`GET /price` and
//! `GET /quote`); alt makers take a `POST /quotes` with a market/side
//! envelope. Every maker serving the pair is asked concurrently and raced
//! against the request timeout. A maker that fails, times out or answers
//! with something invalid contributes no quote and never fails the request.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use swapper_types::{
	current_timestamp, MarketOperation, NativeOrder, NativeOrderWithFillableAmounts, RfqOrder,
	Signature, SignatureType, NULL_ADDRESS,
};
use tracing::{debug, warn};

use crate::SamplerError;

/// Seconds added to "now" for alt maker indicative quotes, which carry no expiry.
const IMPUTED_EXPIRY_SECS: u64 = 120;

/// A standard maker endpoint and the pairs it quotes, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqMakerConfig {
	pub uri: String,
	#[serde(default)]
	pub pairs: Vec<(Address, Address)>,
}

/// One market offered by an alt maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltOffering {
	pub id: String,
	pub base_asset: Address,
	pub quote_asset: Address,
	pub base_symbol: String,
	pub quote_symbol: String,
	pub base_asset_decimals: u32,
	pub quote_asset_decimals: u32,
}

/// An alt maker endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltMakerConfig {
	pub uri: String,
	#[serde(default)]
	pub api_key: String,
	#[serde(default)]
	pub profile: String,
	#[serde(default)]
	pub offerings: Vec<AltOffering>,
}

fn default_expiry_buffer_secs() -> u64 {
	120
}

fn default_maker_timeout_ms() -> u64 {
	600
}

/// Maker registry and request defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqConfig {
	#[serde(default)]
	pub makers: Vec<RfqMakerConfig>,
	#[serde(default)]
	pub alt_makers: Vec<AltMakerConfig>,
	/// Quotes expiring sooner than this are discarded.
	#[serde(default = "default_expiry_buffer_secs")]
	pub expiry_buffer_secs: u64,
	#[serde(default = "default_maker_timeout_ms")]
	pub maker_timeout_ms: u64,
}

impl Default for RfqConfig {
	fn default() -> Self {
		Self {
			makers: Vec::new(),
			alt_makers: Vec::new(),
			expiry_buffer_secs: default_expiry_buffer_secs(),
			maker_timeout_ms: default_maker_timeout_ms(),
		}
	}
}

/// Per-request RFQ options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RfqRequestOpts {
	pub taker_address: Address,
	pub tx_origin: Address,
	/// Sent to standard makers as `0x-api-key`.
	pub api_key: Option<String>,
	/// Integrator id sent to alt makers as `meta.client`.
	pub integrator_id: Option<String>,
	/// Maker units per taker unit; makers use it to skip uncompetitive quotes.
	pub comparison_price: Option<Decimal>,
	/// Overrides the configured per-maker timeout.
	pub maker_timeout: Option<Duration>,
}

/// A validated, signed RFQ order and the maker that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfqFirmQuote {
	pub order: NativeOrderWithFillableAmounts,
	pub maker_uri: String,
}

/// A validated price level without a signed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfqIndicativeQuote {
	pub maker_token: Address,
	pub taker_token: Address,
	pub maker_amount: U256,
	pub taker_amount: U256,
	pub expiry: u64,
	pub maker_uri: String,
}

/// HTTP transport to market makers.
#[async_trait]
pub trait RfqTransport: Send + Sync {
	/// GETs `url` and returns the decoded JSON body of a 2xx answer.
	async fn get(
		&self,
		url: &str,
		query: &[(String, String)],
		headers: &[(String, String)],
	) -> Result<Value, SamplerError>;

	/// POSTs `body` to `url` and returns the decoded JSON body of a 2xx answer.
	async fn post(
		&self,
		url: &str,
		body: &Value,
		headers: &[(String, String)],
	) -> Result<Value, SamplerError>;
}

/// [`RfqTransport`] over a shared reqwest client.
#[derive(Clone, Default)]
pub struct HttpRfqTransport {
	client: reqwest::Client,
}

impl HttpRfqTransport {
	pub fn new(client: reqwest::Client) -> Self {
		Self { client }
	}

	async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, SamplerError> {
		request
			.send()
			.await
			.map_err(|e| SamplerError::Transport(e.to_string()))?
			.error_for_status()
			.map_err(|e| SamplerError::Transport(e.to_string()))?
			.json()
			.await
			.map_err(|e| SamplerError::Decode(e.to_string()))
	}
}

#[async_trait]
impl RfqTransport for HttpRfqTransport {
	async fn get(
		&self,
		url: &str,
		query: &[(String, String)],
		headers: &[(String, String)],
	) -> Result<Value, SamplerError> {
		let mut request = self.client.get(url).query(query);
		for (name, value) in headers {
			request = request.header(name.as_str(), value.as_str());
		}
		self.send(request).await
	}

	async fn post(
		&self,
		url: &str,
		body: &Value,
		headers: &[(String, String)],
	) -> Result<Value, SamplerError> {
		let mut request = self.client.post(url).json(body);
		for (name, value) in headers {
			request = request.header(name.as_str(), value.as_str());
		}
		self.send(request).await
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteKind {
	Firm,
	Indicative,
}

impl QuoteKind {
	fn as_str(self) -> &'static str {
		match self {
			QuoteKind::Firm => "firm",
			QuoteKind::Indicative => "indicative",
		}
	}

	fn path(self) -> &'static str {
		match self {
			QuoteKind::Firm => "quote",
			QuoteKind::Indicative => "price",
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSignature {
	signature_type: u8,
	v: u8,
	r: B256,
	s: B256,
}

impl WireSignature {
	fn into_signature(self) -> Option<Signature> {
		let signature_type = match self.signature_type {
			0 => SignatureType::Illegal,
			1 => SignatureType::Invalid,
			2 => SignatureType::Eip712,
			3 => SignatureType::EthSign,
			4 => SignatureType::PreSigned,
			_ => return None,
		};
		Some(Signature {
			signature_type,
			v: self.v,
			r: self.r,
			s: self.s,
		})
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSignedRfqOrder {
	maker_token: Address,
	taker_token: Address,
	maker_amount: String,
	taker_amount: String,
	maker: Address,
	taker: Address,
	tx_origin: Address,
	pool: B256,
	expiry: String,
	salt: String,
	signature: WireSignature,
}

impl WireSignedRfqOrder {
	fn into_order(self) -> Option<(RfqOrder, Signature)> {
		let order = RfqOrder {
			maker_token: self.maker_token,
			taker_token: self.taker_token,
			maker_amount: self.maker_amount.parse().ok()?,
			taker_amount: self.taker_amount.parse().ok()?,
			maker: self.maker,
			taker: self.taker,
			tx_origin: self.tx_origin,
			pool: self.pool,
			expiry: self.expiry.parse().ok()?,
			salt: U256::from_str(&self.salt).ok()?,
		};
		Some((order, self.signature.into_signature()?))
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIndicativeQuote {
	maker_token: Address,
	taker_token: Address,
	maker_amount: String,
	taker_amount: String,
	expiry: String,
}

#[derive(Debug, Deserialize)]
struct AltQuoteResponse {
	status: String,
	#[serde(default)]
	price: Option<String>,
	#[serde(default)]
	amount: Option<String>,
	#[serde(default)]
	value: Option<String>,
	#[serde(default)]
	data: Option<Value>,
}

/// Finds the offering that trades the two tokens, in either direction.
pub fn get_alt_market_info<'a>(
	offerings: &'a [AltOffering],
	buy_token: Address,
	sell_token: Address,
) -> Option<&'a AltOffering> {
	offerings.iter().find(|o| {
		(o.base_asset == buy_token && o.quote_asset == sell_token)
			|| (o.base_asset == sell_token && o.quote_asset == buy_token)
	})
}

fn to_unit_amount(amount: U256, decimals: u32) -> Option<Decimal> {
	let raw = i128::try_from(u128::try_from(amount).ok()?).ok()?;
	Decimal::try_from_i128_with_scale(raw, decimals)
		.ok()
		.map(|d| d.normalize())
}

fn to_base_unit_amount(amount: Decimal, decimals: u32) -> Option<U256> {
	let scale = Decimal::from(10u64.checked_pow(decimals)?);
	let base_units = amount.checked_mul(scale)?.trunc().to_u128()?;
	Some(U256::from(base_units))
}

/// Requests and validates RFQ quotes from configured makers.
pub struct QuoteRequestor {
	config: RfqConfig,
	transport: Arc<dyn RfqTransport>,
}

impl QuoteRequestor {
	pub fn new(config: RfqConfig, transport: Arc<dyn RfqTransport>) -> Self {
		Self { config, transport }
	}

	pub fn config(&self) -> &RfqConfig {
		&self.config
	}

	/// Whether any maker quotes the pair.
	pub fn has_makers_for(&self, maker_token: Address, taker_token: Address) -> bool {
		self.config
			.makers
			.iter()
			.any(|m| maker_supports_pair(m, maker_token, taker_token))
			|| self
				.config
				.alt_makers
				.iter()
				.any(|m| get_alt_market_info(&m.offerings, maker_token, taker_token).is_some())
	}

	/// Query parameters of a standard maker request.
	pub fn make_query_parameters(
		opts: &RfqRequestOpts,
		side: MarketOperation,
		maker_token: Address,
		taker_token: Address,
		amount: U256,
	) -> Vec<(String, String)> {
		let mut params = vec![
			("sellTokenAddress".to_string(), format!("{:#x}", taker_token)),
			("buyTokenAddress".to_string(), format!("{:#x}", maker_token)),
		];
		let size_key = match side {
			MarketOperation::Sell => "sellAmountBaseUnits",
			MarketOperation::Buy => "buyAmountBaseUnits",
		};
		params.push((size_key.to_string(), amount.to_string()));
		params.push(("takerAddress".to_string(), format!("{:#x}", opts.taker_address)));
		params.push(("txOrigin".to_string(), format!("{:#x}", opts.tx_origin)));
		params.push(("protocolVersion".to_string(), "4".to_string()));
		if let Some(price) = opts.comparison_price {
			params.push(("comparisonPrice".to_string(), price.normalize().to_string()));
		}
		params
	}

	/// Signed RFQ orders from every maker that answered in time with a valid quote.
	pub async fn request_firm_quotes(
		&self,
		maker_token: Address,
		taker_token: Address,
		amount: U256,
		side: MarketOperation,
		opts: &RfqRequestOpts,
	) -> Vec<RfqFirmQuote> {
		if opts.taker_address == NULL_ADDRESS {
			warn!("Firm RFQ quotes require a taker address, skipping");
			return Vec::new();
		}
		let now = current_timestamp();
		self.get_quotes(maker_token, taker_token, amount, side, opts, QuoteKind::Firm)
			.await
			.into_iter()
			.filter_map(|(maker_uri, body)| {
				let quote = self.validate_firm(&body, maker_token, taker_token, opts, now);
				if quote.is_none() {
					warn!(maker = %maker_uri, "Invalid RFQ firm quote, filtering out");
				}
				quote.map(|order| RfqFirmQuote { order, maker_uri })
			})
			.collect()
	}

	/// Price levels from every maker that answered in time with a valid quote.
	pub async fn request_indicative_quotes(
		&self,
		maker_token: Address,
		taker_token: Address,
		amount: U256,
		side: MarketOperation,
		opts: &RfqRequestOpts,
	) -> Vec<RfqIndicativeQuote> {
		let now = current_timestamp();
		self.get_quotes(maker_token, taker_token, amount, side, opts, QuoteKind::Indicative)
			.await
			.into_iter()
			.filter_map(|(maker_uri, body)| {
				let quote = self.validate_indicative(&body, maker_token, taker_token, now);
				if quote.is_none() {
					warn!(maker = %maker_uri, "Invalid RFQ indicative quote, filtering out");
				}
				quote.map(|(maker_amount, taker_amount, expiry)| RfqIndicativeQuote {
					maker_token,
					taker_token,
					maker_amount,
					taker_amount,
					expiry,
					maker_uri,
				})
			})
			.collect()
	}

	fn is_expiring_too_soon(&self, expiry: u64, now: u64) -> bool {
		expiry < now.saturating_add(self.config.expiry_buffer_secs)
	}

	fn validate_firm(
		&self,
		body: &Value,
		maker_token: Address,
		taker_token: Address,
		opts: &RfqRequestOpts,
		now: u64,
	) -> Option<NativeOrderWithFillableAmounts> {
		let signed = body.get("signedOrder")?;
		let wire: WireSignedRfqOrder = serde_json::from_value(signed.clone()).ok()?;
		let (order, signature) = wire.into_order()?;

		if order.maker_token != maker_token || order.taker_token != taker_token {
			debug!("Unexpected tokens in RFQ order");
			return None;
		}
		if order.taker != opts.taker_address || order.tx_origin != opts.tx_origin {
			debug!("Unexpected taker or tx origin in RFQ order");
			return None;
		}
		if self.is_expiring_too_soon(order.expiry, now) {
			debug!(expiry = order.expiry, "RFQ order expires too soon");
			return None;
		}
		if order.maker_amount == 0 || order.taker_amount == 0 {
			return None;
		}
		Some(NativeOrderWithFillableAmounts::fully_fillable(
			NativeOrder::Rfq(order),
			signature,
		))
	}

	fn validate_indicative(
		&self,
		body: &Value,
		maker_token: Address,
		taker_token: Address,
		now: u64,
	) -> Option<(U256, U256, u64)> {
		let wire: WireIndicativeQuote = serde_json::from_value(body.clone()).ok()?;
		let maker_amount = U256::from_str(&wire.maker_amount).ok()?;
		let taker_amount = U256::from_str(&wire.taker_amount).ok()?;
		let expiry: u64 = wire.expiry.parse().ok()?;

		if wire.maker_token != maker_token || wire.taker_token != taker_token {
			return None;
		}
		if self.is_expiring_too_soon(expiry, now) || maker_amount.is_zero() || taker_amount.is_zero()
		{
			return None;
		}
		Some((maker_amount, taker_amount, expiry))
	}

	/// Raw 2xx bodies, normalised to the standard response shape, per maker.
	async fn get_quotes(
		&self,
		maker_token: Address,
		taker_token: Address,
		amount: U256,
		side: MarketOperation,
		opts: &RfqRequestOpts,
		kind: QuoteKind,
	) -> Vec<(String, Value)> {
		let timeout = opts
			.maker_timeout
			.unwrap_or(Duration::from_millis(self.config.maker_timeout_ms));
		let query = Self::make_query_parameters(opts, side, maker_token, taker_token, amount);
		let mut headers = Vec::new();
		if let Some(key) = &opts.api_key {
			headers.push(("0x-api-key".to_string(), key.clone()));
		}

		let standard = self
			.config
			.makers
			.iter()
			.filter(|m| maker_supports_pair(m, maker_token, taker_token))
			.map(|maker| {
				let url = format!("{}/{}", maker.uri.trim_end_matches('/'), kind.path());
				let query = &query;
				let headers = &headers;
				async move {
					let result = tokio::time::timeout(
						timeout,
						self.transport.get(&url, query, headers),
					)
					.await;
					(maker.uri.clone(), flatten(result))
				}
			});
		let standard = join_all(standard);

		let alt = self
			.config
			.alt_makers
			.iter()
			.filter_map(|maker| {
				let offering = get_alt_market_info(&maker.offerings, maker_token, taker_token)?;
				Some((maker, offering))
			})
			.map(|(maker, offering)| async move {
				let result = tokio::time::timeout(
					timeout,
					self.request_alt(maker, offering, maker_token, taker_token, amount, side, opts, kind),
				)
				.await;
				(maker.uri.clone(), flatten(result))
			});
		let alt = join_all(alt);

		let (standard, alt) = futures::join!(standard, alt);
		standard
			.into_iter()
			.chain(alt)
			.filter_map(|(uri, result)| match result {
				Ok(body) => Some((uri, body)),
				Err(e) => {
					warn!(
						maker = %uri,
						quote_type = kind.as_str(),
						error = %e,
						"Failed to get RFQ quote from market maker"
					);
					None
				}
			})
			.collect()
	}

	/// Sends an alt maker request and rewrites its answer in the standard shape.
	#[allow(clippy::too_many_arguments)]
	async fn request_alt(
		&self,
		maker: &AltMakerConfig,
		offering: &AltOffering,
		maker_token: Address,
		taker_token: Address,
		amount: U256,
		side: MarketOperation,
		opts: &RfqRequestOpts,
		kind: QuoteKind,
	) -> Result<Value, SamplerError> {
		let body = alt_request_body(maker, offering, maker_token, taker_token, amount, side, opts, kind)
			.ok_or_else(|| SamplerError::InvalidConfig("amount not representable".into()))?;
		let headers = vec![(
			"Authorization".to_string(),
			format!("Bearer {}", maker.api_key),
		)];
		let url = format!("{}/quotes", maker.uri.trim_end_matches('/'));
		let raw = self.transport.post(&url, &body, &headers).await?;
		let response: AltQuoteResponse =
			serde_json::from_value(raw).map_err(|e| SamplerError::Decode(e.to_string()))?;

		if response.status != "active" && response.status != "live" {
			return Err(SamplerError::Rpc(format!(
				"alt maker answered with status '{}'",
				response.status
			)));
		}

		match kind {
			QuoteKind::Firm => {
				let order = response
					.data
					.as_ref()
					.and_then(|d| d.get("0xv4order"))
					.cloned()
					.ok_or_else(|| SamplerError::Decode("missing 0xv4order".into()))?;
				Ok(json!({ "signedOrder": order }))
			}
			QuoteKind::Indicative => {
				let (maker_amount, taker_amount) =
					alt_indicative_amounts(&response, offering, maker_token)
						.ok_or_else(|| SamplerError::Decode("unusable alt price".into()))?;
				Ok(json!({
					"makerToken": format!("{:#x}", maker_token),
					"takerToken": format!("{:#x}", taker_token),
					"makerAmount": maker_amount.to_string(),
					"takerAmount": taker_amount.to_string(),
					"expiry": (current_timestamp() + IMPUTED_EXPIRY_SECS).to_string(),
				}))
			}
		}
	}
}

fn flatten(
	result: Result<Result<Value, SamplerError>, tokio::time::error::Elapsed>,
) -> Result<Value, SamplerError> {
	result.map_err(|_| SamplerError::Transport("maker timed out".into()))?
}

fn maker_supports_pair(maker: &RfqMakerConfig, maker_token: Address, taker_token: Address) -> bool {
	maker.pairs.iter().any(|(a, b)| {
		(*a == maker_token && *b == taker_token) || (*a == taker_token && *b == maker_token)
	})
}

/// Request envelope for an alt maker. Sizes are whole-token decimals: `amount`
/// counts base asset units and `value` counts quote asset units.
#[allow(clippy::too_many_arguments)]
fn alt_request_body(
	maker: &AltMakerConfig,
	offering: &AltOffering,
	maker_token: Address,
	taker_token: Address,
	amount: U256,
	side: MarketOperation,
	opts: &RfqRequestOpts,
	kind: QuoteKind,
) -> Option<Value> {
	let alt_side = if offering.base_asset == maker_token {
		"buy"
	} else {
		"sell"
	};

	// Alt prices are quote per base; comparison prices are maker per taker.
	let comparison_price = match opts.comparison_price {
		Some(p) if offering.quote_asset == maker_token => Some(p),
		Some(p) if !p.is_zero() => Some(Decimal::ONE / p),
		_ => None,
	};

	let sized_token = match side {
		MarketOperation::Sell => taker_token,
		MarketOperation::Buy => maker_token,
	};
	let (size_key, decimals) = if sized_token == offering.base_asset {
		("amount", offering.base_asset_decimals)
	} else {
		("value", offering.quote_asset_decimals)
	};
	let size = to_unit_amount(amount, decimals)?.to_string();

	let mut meta = json!({
		"txOrigin": format!("{:#x}", opts.tx_origin),
		"taker": format!("{:#x}", opts.taker_address),
		"client": opts.integrator_id.clone().unwrap_or_default(),
	});
	if let Some(price) = comparison_price {
		meta["existingOrder"] = json!({
			"price": price.normalize().to_string(),
			size_key: size.clone(),
		});
	}

	let mut body = json!({
		"market": format!("{}-{}", offering.base_symbol, offering.quote_symbol),
		"model": kind.as_str(),
		"profile": maker.profile,
		"side": alt_side,
		"meta": meta,
	});
	body[size_key] = json!(size);
	Some(body)
}

/// Base-unit maker and taker amounts implied by an alt indicative answer.
fn alt_indicative_amounts(
	response: &AltQuoteResponse,
	offering: &AltOffering,
	maker_token: Address,
) -> Option<(U256, U256)> {
	let price = Decimal::from_str(response.price.as_deref()?).ok()?;
	let (base, quote) = if let Some(amount) = &response.amount {
		let base = Decimal::from_str(amount).ok()?;
		(base, base.checked_mul(price)?)
	} else {
		let quote = Decimal::from_str(response.value.as_deref()?).ok()?;
		if price.is_zero() {
			return None;
		}
		(quote.checked_div(price)?, quote)
	};
	let base_units = to_base_unit_amount(base, offering.base_asset_decimals)?;
	let quote_units = to_base_unit_amount(quote, offering.quote_asset_decimals)?;
	if maker_token == offering.base_asset {
		Some((base_units, quote_units))
	} else {
		Some((quote_units, base_units))
	}
}
