//! Weighted-pool swap math used when pools are sampled off chain.
//!
//! Works on 1e18 fixed-point `U256` values with the same rounding as the
//! pool contract, so sampled amounts match what a swap settles for. Every
//! step is checked; anything the contract would revert on samples as zero.

use alloy_primitives::{Address, U256};
use swapper_types::Pool;

const BONE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);
const MIN_BPOW_BASE: U256 = U256::from_limbs([1, 0, 0, 0]);
const MAX_BPOW_BASE: U256 = U256::from_limbs([1_999_999_999_999_999_999, 0, 0, 0]);
const BPOW_PRECISION: U256 = U256::from_limbs([100_000_000, 0, 0, 0]);

fn bmul(a: U256, b: U256) -> Option<U256> {
	a.checked_mul(b)?.checked_add(BONE / U256::from(2))?.checked_div(BONE)
}

fn bdiv(a: U256, b: U256) -> Option<U256> {
	if b.is_zero() {
		return None;
	}
	a.checked_mul(BONE)?.checked_add(b / U256::from(2))?.checked_div(b)
}

fn bsub_sign(a: U256, b: U256) -> (U256, bool) {
	if a >= b {
		(a - b, false)
	} else {
		(b - a, true)
	}
}

fn bpowi(mut a: U256, mut n: U256) -> Option<U256> {
	let two = U256::from(2);
	let mut z = if n % two == U256::ZERO { BONE } else { a };
	n /= two;
	while !n.is_zero() {
		a = bmul(a, a)?;
		if n % two != U256::ZERO {
			z = bmul(z, a)?;
		}
		n /= two;
	}
	Some(z)
}

/// Binomial series for `base^exp` with `exp < 1`.
fn bpow_approx(base: U256, exp: U256) -> Option<U256> {
	let (x, x_neg) = bsub_sign(base, BONE);
	let mut term = BONE;
	let mut sum = term;
	let mut negative = false;
	let mut i = U256::from(1);
	while term >= BPOW_PRECISION {
		let big_k = i.checked_mul(BONE)?;
		let (c, c_neg) = bsub_sign(exp, big_k - BONE);
		term = bdiv(bmul(term, bmul(c, x)?)?, big_k)?;
		if term.is_zero() {
			break;
		}
		if x_neg {
			negative = !negative;
		}
		if c_neg {
			negative = !negative;
		}
		sum = if negative {
			sum.checked_sub(term)?
		} else {
			sum.checked_add(term)?
		};
		i += U256::from(1);
	}
	Some(sum)
}

fn bpow(base: U256, exp: U256) -> Option<U256> {
	if base < MIN_BPOW_BASE || base > MAX_BPOW_BASE {
		return None;
	}
	let whole = exp / BONE;
	let remain = exp % BONE;
	let whole_pow = bpowi(base, whole)?;
	if remain.is_zero() {
		return Some(whole_pow);
	}
	bmul(whole_pow, bpow_approx(base, remain)?)
}

fn calc_out_given_in(
	balance_in: U256,
	weight_in: U256,
	balance_out: U256,
	weight_out: U256,
	amount_in: U256,
	swap_fee: U256,
) -> Option<U256> {
	// At most half the input balance per swap.
	if amount_in > bmul(balance_in, BONE / U256::from(2))? {
		return None;
	}
	let weight_ratio = bdiv(weight_in, weight_out)?;
	let adjusted_in = bmul(amount_in, BONE.checked_sub(swap_fee)?)?;
	let y = bdiv(balance_in, balance_in.checked_add(adjusted_in)?)?;
	let foo = bpow(y, weight_ratio)?;
	bmul(balance_out, BONE.checked_sub(foo)?)
}

fn calc_in_given_out(
	balance_in: U256,
	weight_in: U256,
	balance_out: U256,
	weight_out: U256,
	amount_out: U256,
	swap_fee: U256,
) -> Option<U256> {
	// At most a third of the output balance per swap.
	if amount_out > bmul(balance_out, BONE / U256::from(3) + U256::from(1))? {
		return None;
	}
	let weight_ratio = bdiv(weight_out, weight_in)?;
	let y = bdiv(balance_out, balance_out.checked_sub(amount_out)?)?;
	let foo = bpow(y, weight_ratio)?.checked_sub(BONE)?;
	bdiv(bmul(balance_in, foo)?, BONE.checked_sub(swap_fee)?)
}

/// Output received for selling `amount_in` of `taker_token` into the pool.
///
/// Returns zero when the pool does not trade the pair or would reject the
/// swap.
pub fn out_given_in(pool: &Pool, taker_token: Address, maker_token: Address, amount_in: U256) -> U256 {
	let (Some(token_in), Some(token_out)) = (pool.token(taker_token), pool.token(maker_token)) else {
		return U256::ZERO;
	};
	calc_out_given_in(
		token_in.balance,
		token_in.weight,
		token_out.balance,
		token_out.weight,
		amount_in,
		pool.swap_fee,
	)
	.unwrap_or_default()
}

/// Input of `taker_token` needed to buy `amount_out` of `maker_token`.
///
/// Returns zero when the pool does not trade the pair or cannot supply the
/// requested amount.
pub fn in_given_out(
	pool: &Pool,
	taker_token: Address,
	maker_token: Address,
	amount_out: U256,
) -> U256 {
	let (Some(token_in), Some(token_out)) = (pool.token(taker_token), pool.token(maker_token)) else {
		return U256::ZERO;
	};
	calc_in_given_out(
		token_in.balance,
		token_in.weight,
		token_out.balance,
		token_out.weight,
		amount_out,
		pool.swap_fee,
	)
	.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::uint;
	use swapper_types::PoolToken;

	const E18: u64 = 1_000_000_000_000_000_000;

	fn units(amount: u64, decimals: u8) -> U256 {
		U256::from(amount) * U256::from(10).pow(U256::from(decimals))
	}

	fn token(byte: u8, balance: U256, decimals: u8, weight: u64) -> PoolToken {
		PoolToken {
			address: Address::repeat_byte(byte),
			balance,
			decimals,
			weight: units(weight, 18),
		}
	}

	fn even_pool() -> Pool {
		Pool {
			id: Address::repeat_byte(9),
			swap_fee: U256::ZERO,
			tokens: vec![token(1, units(1_000, 18), 18, 1), token(2, units(1_000, 6), 6, 1)],
		}
	}

	#[test]
	fn test_even_pool_matches_constant_product() {
		let pool = even_pool();
		let ten = units(10, 18);
		let out = out_given_in(&pool, Address::repeat_byte(1), Address::repeat_byte(2), ten);
		// 1000 * 10 / 1010 units of a 6 decimal token
		assert_eq!(out, U256::from(9_900_990u64));

		let cost = in_given_out(&pool, Address::repeat_byte(1), Address::repeat_byte(2), out);
		assert_eq!(cost, U256::from(9_999_999_899_000_000_000u128));
		assert!(cost <= ten);
	}

	#[test]
	fn test_uneven_weights_and_fee() {
		let pool = Pool {
			id: Address::repeat_byte(9),
			swap_fee: U256::from(3 * E18 / 1_000),
			tokens: vec![token(1, units(1_000, 18), 18, 30), token(2, units(500, 18), 18, 20)],
		};
		let out = out_given_in(&pool, Address::repeat_byte(1), Address::repeat_byte(2), units(5, 18));
		assert_eq!(out, U256::from(3_715_587_650_278_851_000u128));

		let cost = in_given_out(&pool, Address::repeat_byte(1), Address::repeat_byte(2), out);
		assert_eq!(cost, U256::from(4_999_999_999_493_818_455u128));
	}

	#[test]
	fn test_amounts_beyond_u128_stay_exact() {
		let balance = uint!(1_000_000_000_000_000_000_000_000_000_000_000_000_000_000_000_U256);
		let pool = Pool {
			id: Address::repeat_byte(9),
			swap_fee: U256::ZERO,
			tokens: vec![token(1, balance, 18, 1), token(2, balance, 18, 1)],
		};
		let out = out_given_in(
			&pool,
			Address::repeat_byte(1),
			Address::repeat_byte(2),
			balance / U256::from(100),
		);
		assert_eq!(
			out,
			uint!(9_900_990_099_009_901_000_000_000_000_000_000_000_000_000_U256)
		);
		assert!(out > U256::from(u128::MAX));
	}

	#[test]
	fn test_unknown_token_and_ratio_limits() {
		let pool = even_pool();
		assert_eq!(
			out_given_in(&pool, Address::repeat_byte(7), Address::repeat_byte(2), U256::from(1)),
			U256::ZERO
		);
		// More than half the input balance.
		assert_eq!(
			out_given_in(&pool, Address::repeat_byte(1), Address::repeat_byte(2), units(501, 18)),
			U256::ZERO
		);
		// More than a third of the output balance.
		assert_eq!(
			in_given_out(&pool, Address::repeat_byte(1), Address::repeat_byte(2), units(334, 6)),
			U256::ZERO
		);
	}

	#[test]
	fn test_zero_weight_samples_nothing() {
		let mut pool = even_pool();
		pool.tokens[1].weight = U256::ZERO;
		assert_eq!(
			out_given_in(&pool, Address::repeat_byte(1), Address::repeat_byte(2), units(1, 18)),
			U256::ZERO
		);
	}
}
