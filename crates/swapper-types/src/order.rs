//! Native 0x v4 limit and RFQ orders.
//!
//! Amounts are `u128` as on chain. Order hashes follow EIP-712 under the
//! `ZeroEx` domain so that hashes computed here match the exchange proxy.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{eip712_domain, sol, Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

mod eip712 {
	use super::sol;

	sol! {
		struct LimitOrder {
			address makerToken;
			address takerToken;
			uint128 makerAmount;
			uint128 takerAmount;
			uint128 takerTokenFeeAmount;
			address maker;
			address taker;
			address sender;
			address feeRecipient;
			bytes32 pool;
			uint64 expiry;
			uint256 salt;
		}

		struct RfqOrder {
			address makerToken;
			address takerToken;
			uint128 makerAmount;
			uint128 takerAmount;
			address maker;
			address taker;
			address txOrigin;
			bytes32 pool;
			uint64 expiry;
			uint256 salt;
		}
	}
}

/// Builds the EIP-712 domain of the exchange proxy on `chain_id`.
pub fn exchange_proxy_domain(chain_id: u64, exchange_proxy: Address) -> Eip712Domain {
	eip712_domain! {
		name: "ZeroEx",
		version: "1.0.0",
		chain_id: chain_id,
		verifying_contract: exchange_proxy,
	}
}

/// A v4 limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrder {
	pub maker_token: Address,
	pub taker_token: Address,
	pub maker_amount: u128,
	pub taker_amount: u128,
	pub taker_token_fee_amount: u128,
	pub maker: Address,
	pub taker: Address,
	pub sender: Address,
	pub fee_recipient: Address,
	pub pool: B256,
	pub expiry: u64,
	pub salt: U256,
}

impl LimitOrder {
	/// EIP-712 hash of the order.
	pub fn hash(&self, domain: &Eip712Domain) -> B256 {
		eip712::LimitOrder {
			makerToken: self.maker_token,
			takerToken: self.taker_token,
			makerAmount: self.maker_amount,
			takerAmount: self.taker_amount,
			takerTokenFeeAmount: self.taker_token_fee_amount,
			maker: self.maker,
			taker: self.taker,
			sender: self.sender,
			feeRecipient: self.fee_recipient,
			pool: self.pool,
			expiry: self.expiry,
			salt: self.salt,
		}
		.eip712_signing_hash(domain)
	}
}

/// A v4 RFQ order, restricted to a single transaction origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqOrder {
	pub maker_token: Address,
	pub taker_token: Address,
	pub maker_amount: u128,
	pub taker_amount: u128,
	pub maker: Address,
	pub taker: Address,
	pub tx_origin: Address,
	pub pool: B256,
	pub expiry: u64,
	pub salt: U256,
}

impl RfqOrder {
	/// EIP-712 hash of the order.
	pub fn hash(&self, domain: &Eip712Domain) -> B256 {
		eip712::RfqOrder {
			makerToken: self.maker_token,
			takerToken: self.taker_token,
			makerAmount: self.maker_amount,
			takerAmount: self.taker_amount,
			maker: self.maker,
			taker: self.taker,
			txOrigin: self.tx_origin,
			pool: self.pool,
			expiry: self.expiry,
			salt: self.salt,
		}
		.eip712_signing_hash(domain)
	}
}

/// Either flavour of native order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "order", rename_all = "lowercase")]
pub enum NativeOrder {
	Limit(LimitOrder),
	Rfq(RfqOrder),
}

impl NativeOrder {
	pub fn maker(&self) -> Address {
		match self {
			NativeOrder::Limit(o) => o.maker,
			NativeOrder::Rfq(o) => o.maker,
		}
	}

	pub fn maker_token(&self) -> Address {
		match self {
			NativeOrder::Limit(o) => o.maker_token,
			NativeOrder::Rfq(o) => o.maker_token,
		}
	}

	pub fn taker_token(&self) -> Address {
		match self {
			NativeOrder::Limit(o) => o.taker_token,
			NativeOrder::Rfq(o) => o.taker_token,
		}
	}

	pub fn maker_amount(&self) -> u128 {
		match self {
			NativeOrder::Limit(o) => o.maker_amount,
			NativeOrder::Rfq(o) => o.maker_amount,
		}
	}

	pub fn taker_amount(&self) -> u128 {
		match self {
			NativeOrder::Limit(o) => o.taker_amount,
			NativeOrder::Rfq(o) => o.taker_amount,
		}
	}

	/// Fee paid by the taker in taker tokens; RFQ orders carry none.
	pub fn taker_token_fee_amount(&self) -> u128 {
		match self {
			NativeOrder::Limit(o) => o.taker_token_fee_amount,
			NativeOrder::Rfq(_) => 0,
		}
	}

	pub fn expiry(&self) -> u64 {
		match self {
			NativeOrder::Limit(o) => o.expiry,
			NativeOrder::Rfq(o) => o.expiry,
		}
	}

	pub fn salt(&self) -> U256 {
		match self {
			NativeOrder::Limit(o) => o.salt,
			NativeOrder::Rfq(o) => o.salt,
		}
	}

	pub fn is_rfq(&self) -> bool {
		matches!(self, NativeOrder::Rfq(_))
	}

	pub fn hash(&self, domain: &Eip712Domain) -> B256 {
		match self {
			NativeOrder::Limit(o) => o.hash(domain),
			NativeOrder::Rfq(o) => o.hash(domain),
		}
	}
}

/// Signature scheme of a native order signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureType {
	Illegal = 0,
	Invalid = 1,
	Eip712 = 2,
	EthSign = 3,
	PreSigned = 4,
}

/// Signature over a native order hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
	pub signature_type: SignatureType,
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

/// A native order together with a snapshot of how much of it can still be filled.
///
/// The fillable amounts are read from chain (or assumed full for fresh RFQ
/// quotes) and are never mutated after the snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeOrderWithFillableAmounts {
	pub order: NativeOrder,
	pub signature: Signature,
	pub fillable_taker_amount: U256,
	pub fillable_maker_amount: U256,
	pub fillable_taker_fee_amount: U256,
}

impl NativeOrderWithFillableAmounts {
	/// Snapshot assuming the whole order is still fillable.
	pub fn fully_fillable(order: NativeOrder, signature: Signature) -> Self {
		let fillable_taker_amount = U256::from(order.taker_amount());
		let fillable_maker_amount = U256::from(order.maker_amount());
		let fillable_taker_fee_amount = U256::from(order.taker_token_fee_amount());
		Self {
			order,
			signature,
			fillable_taker_amount,
			fillable_maker_amount,
			fillable_taker_fee_amount,
		}
	}

	/// Snapshot from a remaining fillable taker amount; maker and fee amounts
	/// are scaled down proportionally.
	pub fn from_fillable_taker_amount(
		order: NativeOrder,
		signature: Signature,
		fillable_taker_amount: U256,
	) -> Self {
		let taker_amount = U256::from(order.taker_amount());
		let (fillable_maker_amount, fillable_taker_fee_amount) = if taker_amount.is_zero() {
			(U256::ZERO, U256::ZERO)
		} else {
			(
				fillable_taker_amount * U256::from(order.maker_amount()) / taker_amount,
				fillable_taker_amount * U256::from(order.taker_token_fee_amount()) / taker_amount,
			)
		};
		Self {
			order,
			signature,
			fillable_taker_amount,
			fillable_maker_amount,
			fillable_taker_fee_amount,
		}
	}

	/// Snapshot from a remaining fillable maker amount.
	pub fn from_fillable_maker_amount(
		order: NativeOrder,
		signature: Signature,
		fillable_maker_amount: U256,
	) -> Self {
		let maker_amount = U256::from(order.maker_amount());
		if maker_amount.is_zero() {
			return Self::from_fillable_taker_amount(order, signature, U256::ZERO);
		}
		let fillable_taker_amount = fillable_maker_amount * U256::from(order.taker_amount()) / maker_amount;
		Self {
			fillable_maker_amount,
			..Self::from_fillable_taker_amount(order, signature, fillable_taker_amount)
		}
	}
}

/// Lifecycle status of a native order as seen by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	Invalid,
	Fillable,
	Filled,
	Cancelled,
	Expired,
	Bad,
}

/// Status report for a single order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
	pub order_hash: B256,
	pub status: OrderStatus,
	pub taker_token_filled_amount: U256,
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	fn limit_order(salt: u64) -> LimitOrder {
		LimitOrder {
			maker_token: address!("6b175474e89094c44da98b954eedeac495271d0f"),
			taker_token: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
			maker_amount: 1_000,
			taker_amount: 500,
			taker_token_fee_amount: 10,
			maker: address!("1000000000000000000000000000000000000001"),
			taker: Address::ZERO,
			sender: Address::ZERO,
			fee_recipient: Address::ZERO,
			pool: B256::ZERO,
			expiry: 1_700_000_000,
			salt: U256::from(salt),
		}
	}

	#[test]
	fn test_order_hash_depends_on_domain_and_salt() {
		let proxy = address!("def1c0ded9bec7f1a1670819833240f027b25eff");
		let mainnet = exchange_proxy_domain(1, proxy);
		let bsc = exchange_proxy_domain(56, proxy);

		let order = limit_order(1);
		assert_eq!(order.hash(&mainnet), order.hash(&mainnet));
		assert_ne!(order.hash(&mainnet), order.hash(&bsc));
		assert_ne!(order.hash(&mainnet), limit_order(2).hash(&mainnet));
	}

	#[test]
	fn test_fillable_amounts_scale_with_taker_amount() {
		let signature = Signature {
			signature_type: SignatureType::Eip712,
			v: 27,
			r: B256::ZERO,
			s: B256::ZERO,
		};
		let snapshot = NativeOrderWithFillableAmounts::from_fillable_taker_amount(
			NativeOrder::Limit(limit_order(1)),
			signature.clone(),
			U256::from(250),
		);
		assert_eq!(snapshot.fillable_maker_amount, U256::from(500));
		assert_eq!(snapshot.fillable_taker_fee_amount, U256::from(5));

		let by_maker = NativeOrderWithFillableAmounts::from_fillable_maker_amount(
			NativeOrder::Limit(limit_order(1)),
			signature,
			U256::from(500),
		);
		assert_eq!(by_maker, snapshot);
	}
}
