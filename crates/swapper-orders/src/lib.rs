//! Lifecycle model of native 0x v4 orders.
//!
//! [`OrderLedger`] mirrors the exchange proxy's order bookkeeping: per-order
//! filled amounts, explicit cancellations and the per-pair minimum valid salt.
//! It answers the same status queries the exchange does and applies fills and
//! cancellations with the same rules, so quotes built against it behave the
//! way settlement will.
//!
//! Signature recovery is out of scope here; signatures are carried along but
//! not checked.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::Eip712Domain;
use std::collections::{HashMap, HashSet};
use swapper_types::{
	exchange_proxy_domain, LimitOrder, NativeOrder, NativeOrderWithFillableAmounts, OrderInfo,
	OrderStatus, RfqOrder, Signature,
};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when filling or cancelling an order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
	/// Only the order's maker may cancel it.
	#[error("Only the maker can cancel order {0}")]
	OnlyMaker(B256),
	/// The order restricts who may take it.
	#[error("Order {0} can only be filled by its designated taker")]
	OnlyTaker(B256),
	/// The order restricts who may submit the fill.
	#[error("Order {0} can only be filled by its designated sender")]
	OnlySender(B256),
	/// The RFQ order was submitted from an origin it does not allow.
	#[error("Transaction origin {origin} is not allowed for order {order_hash}")]
	InvalidTxOrigin { order_hash: B256, origin: Address },
	/// The order is not in a fillable state.
	#[error("Order {order_hash} is not fillable: {status:?}")]
	NotFillable {
		order_hash: B256,
		status: OrderStatus,
	},
	/// The order has nothing left to fill or a zero amount was requested.
	#[error("Nothing left to fill on order {0}")]
	NothingToFill(B256),
}

/// Amounts transferred by a single fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillResults {
	pub taker_token_filled_amount: U256,
	pub maker_token_filled_amount: U256,
	pub taker_token_fee_filled_amount: U256,
}

type PairKey = (Address, Address, Address);

/// In-memory ledger of fills and cancellations for native orders.
pub struct OrderLedger {
	domain: Eip712Domain,
	filled: HashMap<B256, U256>,
	cancelled: HashSet<B256>,
	/// Minimum valid salt per (maker, maker token, taker token) for limit orders.
	limit_min_salts: HashMap<PairKey, U256>,
	/// Same as above for RFQ orders; the two never affect each other.
	rfq_min_salts: HashMap<PairKey, U256>,
	/// Origins each registering origin allows to fill on its behalf.
	allowed_rfq_origins: HashMap<Address, HashSet<Address>>,
}

impl OrderLedger {
	/// Creates an empty ledger for the exchange proxy on `chain_id`.
	pub fn new(chain_id: u64, exchange_proxy: Address) -> Self {
		Self {
			domain: exchange_proxy_domain(chain_id, exchange_proxy),
			filled: HashMap::new(),
			cancelled: HashSet::new(),
			limit_min_salts: HashMap::new(),
			rfq_min_salts: HashMap::new(),
			allowed_rfq_origins: HashMap::new(),
		}
	}

	pub fn order_hash(&self, order: &NativeOrder) -> B256 {
		order.hash(&self.domain)
	}

	fn min_valid_salt(&self, order: &NativeOrder) -> U256 {
		let key = (order.maker(), order.maker_token(), order.taker_token());
		let salts = if order.is_rfq() {
			&self.rfq_min_salts
		} else {
			&self.limit_min_salts
		};
		salts.get(&key).copied().unwrap_or(U256::ZERO)
	}

	/// Reports the status of an order at unix time `now`.
	///
	/// Checks run in a fixed priority so that terminal states stick: once an
	/// order is filled, later cancellation or expiry does not change its status.
	/// Cancellation, by hash or by minimum salt, outranks expiry, so an expired
	/// order that was also cancelled reports `Cancelled`.
	pub fn get_order_info(&self, order: &NativeOrder, now: u64) -> OrderInfo {
		let order_hash = self.order_hash(order);
		let filled = self.filled.get(&order_hash).copied().unwrap_or(U256::ZERO);

		let status = if order.maker() == Address::ZERO {
			OrderStatus::Bad
		} else if order.maker_amount() == 0 || order.taker_amount() == 0 {
			OrderStatus::Invalid
		} else if filled >= U256::from(order.taker_amount()) {
			OrderStatus::Filled
		} else if self.cancelled.contains(&order_hash) || order.salt() < self.min_valid_salt(order) {
			OrderStatus::Cancelled
		} else if order.expiry() <= now {
			OrderStatus::Expired
		} else {
			OrderStatus::Fillable
		};

		OrderInfo {
			order_hash,
			status,
			taker_token_filled_amount: filled,
		}
	}

	/// Fills up to `taker_token_fill_amount` of a limit order.
	///
	/// The fill is clamped to what remains; it never over-fills.
	pub fn fill_limit_order(
		&mut self,
		order: &LimitOrder,
		_signature: &Signature,
		taker: Address,
		sender: Address,
		taker_token_fill_amount: U256,
		now: u64,
	) -> Result<FillResults, OrderError> {
		let native = NativeOrder::Limit(order.clone());
		let info = self.get_order_info(&native, now);
		ensure_fillable(&info)?;

		if order.sender != Address::ZERO && order.sender != sender {
			return Err(OrderError::OnlySender(info.order_hash));
		}
		if order.taker != Address::ZERO && order.taker != taker {
			return Err(OrderError::OnlyTaker(info.order_hash));
		}

		self.settle(&native, &info, taker_token_fill_amount)
	}

	/// Fills up to `taker_token_fill_amount` of an RFQ order.
	///
	/// `tx_origin` must be the order's origin or one it registered as allowed.
	pub fn fill_rfq_order(
		&mut self,
		order: &RfqOrder,
		_signature: &Signature,
		taker: Address,
		tx_origin: Address,
		taker_token_fill_amount: U256,
		now: u64,
	) -> Result<FillResults, OrderError> {
		let native = NativeOrder::Rfq(order.clone());
		let info = self.get_order_info(&native, now);
		ensure_fillable(&info)?;

		if order.taker != Address::ZERO && order.taker != taker {
			return Err(OrderError::OnlyTaker(info.order_hash));
		}
		let origin_allowed = order.tx_origin == tx_origin
			|| self
				.allowed_rfq_origins
				.get(&order.tx_origin)
				.is_some_and(|allowed| allowed.contains(&tx_origin));
		if !origin_allowed {
			return Err(OrderError::InvalidTxOrigin {
				order_hash: info.order_hash,
				origin: tx_origin,
			});
		}

		self.settle(&native, &info, taker_token_fill_amount)
	}

	fn settle(
		&mut self,
		order: &NativeOrder,
		info: &OrderInfo,
		requested: U256,
	) -> Result<FillResults, OrderError> {
		let taker_amount = U256::from(order.taker_amount());
		let remaining = taker_amount.saturating_sub(info.taker_token_filled_amount);
		let taker_filled = requested.min(remaining);
		if taker_filled.is_zero() {
			return Err(OrderError::NothingToFill(info.order_hash));
		}

		let results = FillResults {
			taker_token_filled_amount: taker_filled,
			maker_token_filled_amount: taker_filled * U256::from(order.maker_amount()) / taker_amount,
			taker_token_fee_filled_amount: taker_filled
				* U256::from(order.taker_token_fee_amount())
				/ taker_amount,
		};

		*self.filled.entry(info.order_hash).or_insert(U256::ZERO) += taker_filled;
		debug!(
			order_hash = %info.order_hash,
			filled = %results.taker_token_filled_amount,
			"Order filled"
		);

		Ok(results)
	}

	/// Cancels a single order. Only its maker may do so; repeating is a no-op.
	pub fn cancel_order(&mut self, order: &NativeOrder, caller: Address) -> Result<(), OrderError> {
		let order_hash = self.order_hash(order);
		if order.maker() != caller {
			return Err(OrderError::OnlyMaker(order_hash));
		}
		self.cancelled.insert(order_hash);
		debug!(order_hash = %order_hash, "Order cancelled");
		Ok(())
	}

	/// Cancels every limit order of `maker` on the pair whose salt is below
	/// `min_valid_salt`. The stored watermark only ever grows.
	pub fn cancel_pair_limit_orders_up_to(
		&mut self,
		maker: Address,
		maker_token: Address,
		taker_token: Address,
		min_valid_salt: U256,
	) {
		raise_watermark(
			&mut self.limit_min_salts,
			(maker, maker_token, taker_token),
			min_valid_salt,
		);
	}

	/// RFQ counterpart of [`Self::cancel_pair_limit_orders_up_to`].
	pub fn cancel_pair_rfq_orders_up_to(
		&mut self,
		maker: Address,
		maker_token: Address,
		taker_token: Address,
		min_valid_salt: U256,
	) {
		raise_watermark(
			&mut self.rfq_min_salts,
			(maker, maker_token, taker_token),
			min_valid_salt,
		);
	}

	/// Applies [`Self::cancel_pair_limit_orders_up_to`] to several pairs at once.
	pub fn batch_cancel_pair_limit_orders_up_to(
		&mut self,
		maker: Address,
		pairs: &[(Address, Address, U256)],
	) {
		for (maker_token, taker_token, salt) in pairs {
			self.cancel_pair_limit_orders_up_to(maker, *maker_token, *taker_token, *salt);
		}
	}

	/// Applies [`Self::cancel_pair_rfq_orders_up_to`] to several pairs at once.
	pub fn batch_cancel_pair_rfq_orders_up_to(
		&mut self,
		maker: Address,
		pairs: &[(Address, Address, U256)],
	) {
		for (maker_token, taker_token, salt) in pairs {
			self.cancel_pair_rfq_orders_up_to(maker, *maker_token, *taker_token, *salt);
		}
	}

	/// Lets `origin` allow (or disallow) other addresses to fill its RFQ orders.
	pub fn register_allowed_rfq_origins(
		&mut self,
		origin: Address,
		origins: &[Address],
		allowed: bool,
	) {
		let entry = self.allowed_rfq_origins.entry(origin).or_default();
		for o in origins {
			if allowed {
				entry.insert(*o);
			} else {
				entry.remove(o);
			}
		}
	}

	/// Snapshots how much of `order` can still be filled at `now`.
	///
	/// Orders that are not fillable snapshot as zero.
	pub fn fillable_amounts(
		&self,
		order: &NativeOrder,
		signature: &Signature,
		now: u64,
	) -> NativeOrderWithFillableAmounts {
		let info = self.get_order_info(order, now);
		let remaining = if info.status == OrderStatus::Fillable {
			U256::from(order.taker_amount()).saturating_sub(info.taker_token_filled_amount)
		} else {
			U256::ZERO
		};
		NativeOrderWithFillableAmounts::from_fillable_taker_amount(
			order.clone(),
			signature.clone(),
			remaining,
		)
	}
}

fn ensure_fillable(info: &OrderInfo) -> Result<(), OrderError> {
	if info.status != OrderStatus::Fillable {
		return Err(OrderError::NotFillable {
			order_hash: info.order_hash,
			status: info.status,
		});
	}
	Ok(())
}

fn raise_watermark(salts: &mut HashMap<PairKey, U256>, key: PairKey, salt: U256) {
	let current = salts.entry(key).or_insert(U256::ZERO);
	if salt > *current {
		*current = salt;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use swapper_types::SignatureType;

	const NOW: u64 = 1_700_000_000;
	const MAKER: Address = address!("1000000000000000000000000000000000000001");
	const TAKER: Address = address!("2000000000000000000000000000000000000002");
	const DAI: Address = address!("6b175474e89094c44da98b954eedeac495271d0f");
	const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

	fn ledger() -> OrderLedger {
		OrderLedger::new(1, address!("def1c0ded9bec7f1a1670819833240f027b25eff"))
	}

	fn signature() -> Signature {
		Signature {
			signature_type: SignatureType::Eip712,
			v: 28,
			r: B256::repeat_byte(1),
			s: B256::repeat_byte(2),
		}
	}

	fn limit(salt: u64) -> LimitOrder {
		LimitOrder {
			maker_token: DAI,
			taker_token: WETH,
			maker_amount: 1_000,
			taker_amount: 100,
			taker_token_fee_amount: 0,
			maker: MAKER,
			taker: Address::ZERO,
			sender: Address::ZERO,
			fee_recipient: Address::ZERO,
			pool: B256::ZERO,
			expiry: NOW + 600,
			salt: U256::from(salt),
		}
	}

	fn rfq(salt: u64) -> RfqOrder {
		RfqOrder {
			maker_token: DAI,
			taker_token: WETH,
			maker_amount: 1_000,
			taker_amount: 100,
			maker: MAKER,
			taker: TAKER,
			tx_origin: TAKER,
			pool: B256::ZERO,
			expiry: NOW + 600,
			salt: U256::from(salt),
		}
	}

	#[test]
	fn test_overfill_is_clamped_to_remaining() {
		let mut ledger = ledger();
		let order = limit(1);

		let first = ledger
			.fill_limit_order(&order, &signature(), TAKER, TAKER, U256::from(60), NOW)
			.unwrap();
		assert_eq!(first.maker_token_filled_amount, U256::from(600));

		let second = ledger
			.fill_limit_order(&order, &signature(), TAKER, TAKER, U256::from(1_000), NOW)
			.unwrap();
		assert_eq!(second.taker_token_filled_amount, U256::from(40));
		assert_eq!(second.maker_token_filled_amount, U256::from(400));

		let info = ledger.get_order_info(&NativeOrder::Limit(order.clone()), NOW);
		assert_eq!(info.status, OrderStatus::Filled);
		assert_eq!(info.taker_token_filled_amount, U256::from(100));

		let third = ledger.fill_limit_order(&order, &signature(), TAKER, TAKER, U256::from(1), NOW);
		assert!(matches!(third, Err(OrderError::NotFillable { .. })));
	}

	#[test]
	fn test_filled_status_survives_cancel_and_expiry() {
		let mut ledger = ledger();
		let order = limit(1);
		let native = NativeOrder::Limit(order.clone());
		ledger
			.fill_limit_order(&order, &signature(), TAKER, TAKER, U256::from(100), NOW)
			.unwrap();

		ledger.cancel_order(&native, MAKER).unwrap();
		assert_eq!(ledger.get_order_info(&native, NOW).status, OrderStatus::Filled);

		let info = ledger.get_order_info(&native, NOW + 10_000);
		assert_eq!(info.status, OrderStatus::Filled);
		assert_eq!(info.taker_token_filled_amount, U256::from(100));
	}

	#[test]
	fn test_partial_fill_then_expiry_and_cancel() {
		let mut ledger = ledger();
		let order = limit(1);
		let native = NativeOrder::Limit(order.clone());
		ledger
			.fill_limit_order(&order, &signature(), TAKER, TAKER, U256::from(10), NOW)
			.unwrap();

		let expired = ledger.get_order_info(&native, order.expiry);
		assert_eq!(expired.status, OrderStatus::Expired);
		assert_eq!(expired.taker_token_filled_amount, U256::from(10));

		assert_eq!(
			ledger.cancel_order(&native, TAKER),
			Err(OrderError::OnlyMaker(ledger.order_hash(&native)))
		);
		ledger.cancel_order(&native, MAKER).unwrap();
		ledger.cancel_order(&native, MAKER).unwrap();
		assert_eq!(
			ledger.get_order_info(&native, order.expiry).status,
			OrderStatus::Cancelled
		);
	}

	#[test]
	fn test_salt_cancellation_is_scoped() {
		let mut ledger = ledger();
		ledger.cancel_pair_limit_orders_up_to(MAKER, DAI, WETH, U256::from(10));

		let below = NativeOrder::Limit(limit(9));
		let at = NativeOrder::Limit(limit(10));
		assert_eq!(ledger.get_order_info(&below, NOW).status, OrderStatus::Cancelled);
		assert_eq!(ledger.get_order_info(&at, NOW).status, OrderStatus::Fillable);

		let mut other_pair = limit(1);
		other_pair.maker_token = WETH;
		other_pair.taker_token = DAI;
		assert_eq!(
			ledger
				.get_order_info(&NativeOrder::Limit(other_pair), NOW)
				.status,
			OrderStatus::Fillable
		);

		let mut other_maker = limit(1);
		other_maker.maker = TAKER;
		assert_eq!(
			ledger
				.get_order_info(&NativeOrder::Limit(other_maker), NOW)
				.status,
			OrderStatus::Fillable
		);

		let rfq_below = NativeOrder::Rfq(rfq(9));
		assert_eq!(ledger.get_order_info(&rfq_below, NOW).status, OrderStatus::Fillable);

		// Lowering the watermark has no effect.
		ledger.cancel_pair_limit_orders_up_to(MAKER, DAI, WETH, U256::from(2));
		assert_eq!(ledger.get_order_info(&below, NOW).status, OrderStatus::Cancelled);
	}

	#[test]
	fn test_invalid_and_bad_orders() {
		let ledger = ledger();
		let mut zero_amount = limit(1);
		zero_amount.taker_amount = 0;
		assert_eq!(
			ledger
				.get_order_info(&NativeOrder::Limit(zero_amount), NOW)
				.status,
			OrderStatus::Invalid
		);

		let mut no_maker = limit(1);
		no_maker.maker = Address::ZERO;
		assert_eq!(
			ledger.get_order_info(&NativeOrder::Limit(no_maker), NOW).status,
			OrderStatus::Bad
		);
	}

	#[test]
	fn test_rfq_origin_rules() {
		let mut ledger = ledger();
		let order = rfq(1);
		let relayer = address!("3000000000000000000000000000000000000003");

		let denied = ledger.fill_rfq_order(&order, &signature(), TAKER, relayer, U256::from(5), NOW);
		assert!(matches!(denied, Err(OrderError::InvalidTxOrigin { .. })));

		ledger.register_allowed_rfq_origins(TAKER, &[relayer], true);
		let filled = ledger
			.fill_rfq_order(&order, &signature(), TAKER, relayer, U256::from(5), NOW)
			.unwrap();
		assert_eq!(filled.maker_token_filled_amount, U256::from(50));

		let wrong_taker = ledger.fill_rfq_order(&order, &signature(), relayer, TAKER, U256::from(5), NOW);
		assert!(matches!(wrong_taker, Err(OrderError::OnlyTaker(_))));
	}

	#[test]
	fn test_fillable_snapshot() {
		let mut ledger = ledger();
		let order = limit(1);
		let native = NativeOrder::Limit(order.clone());
		ledger
			.fill_limit_order(&order, &signature(), TAKER, TAKER, U256::from(25), NOW)
			.unwrap();

		let snapshot = ledger.fillable_amounts(&native, &signature(), NOW);
		assert_eq!(snapshot.fillable_taker_amount, U256::from(75));
		assert_eq!(snapshot.fillable_maker_amount, U256::from(750));

		let expired = ledger.fillable_amounts(&native, &signature(), order.expiry + 1);
		assert_eq!(expired.fillable_taker_amount, U256::ZERO);
	}
}
