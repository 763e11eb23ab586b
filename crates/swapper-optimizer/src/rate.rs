//! Exact rational arithmetic on token amounts.

use alloy_primitives::{U256, U512};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use swapper_types::MarketOperation;

pub(crate) fn widen(value: U256) -> U512 {
	let mut limbs = [0u64; 8];
	limbs[..4].copy_from_slice(value.as_limbs());
	U512::from_limbs(limbs)
}

/// Narrows back to 256 bits, saturating at `U256::MAX`.
pub(crate) fn narrow(value: U512) -> U256 {
	let limbs = value.as_limbs();
	if limbs[4..].iter().any(|l| *l != 0) {
		return U256::MAX;
	}
	U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]])
}

/// `value * numerator / denominator`, rounded down or up.
pub fn mul_div(value: U256, numerator: U256, denominator: U256, round_up: bool) -> U256 {
	if denominator.is_zero() {
		return U256::ZERO;
	}
	let product = widen(value) * widen(numerator);
	let denominator = widen(denominator);
	let mut quotient = product / denominator;
	if round_up && !(product % denominator).is_zero() {
		quotient += U512::from(1u8);
	}
	narrow(quotient)
}

/// Output per unit of input, compared by cross-multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
	pub output: U256,
	pub input: U256,
}

impl Rate {
	pub fn new(output: U256, input: U256) -> Self {
		Self { output, input }
	}

	/// Numeric ordering of `output / input`. A zero input ranks lowest.
	pub fn cmp_value(&self, other: &Rate) -> Ordering {
		match (self.input.is_zero(), other.input.is_zero()) {
			(true, true) => Ordering::Equal,
			(true, false) => Ordering::Less,
			(false, true) => Ordering::Greater,
			(false, false) => {
				(widen(self.output) * widen(other.input)).cmp(&(widen(other.output) * widen(self.input)))
			}
		}
	}

	/// Ordering by desirability: higher output per input for sells, lower
	/// cost per unit bought for buys.
	pub fn cmp_for(&self, other: &Rate, side: MarketOperation) -> Ordering {
		match side {
			MarketOperation::Sell => self.cmp_value(other),
			MarketOperation::Buy => other.cmp_value(self),
		}
	}
}

/// Splits a decimal fraction in `[0, 1]` into `numerator / 10^scale`.
pub(crate) fn decimal_fraction(value: Decimal) -> Option<(U256, U256)> {
	if value.is_sign_negative() || value > Decimal::ONE {
		return None;
	}
	let mantissa = u128::try_from(value.mantissa()).ok()?;
	let denominator = U256::from(10u64).pow(U256::from(value.scale()));
	Some((U256::from(mantissa), denominator))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rate_ordering() {
		let a = Rate::new(U256::from(3), U256::from(2));
		let b = Rate::new(U256::from(299), U256::from(200));
		assert_eq!(a.cmp_value(&b), Ordering::Greater);
		assert_eq!(a.cmp_for(&b, MarketOperation::Sell), Ordering::Greater);
		assert_eq!(a.cmp_for(&b, MarketOperation::Buy), Ordering::Less);

		// Large values do not overflow the comparison.
		let big = Rate::new(U256::MAX, U256::MAX - U256::from(1));
		let one = Rate::new(U256::from(1), U256::from(1));
		assert_eq!(big.cmp_value(&one), Ordering::Greater);
	}

	#[test]
	fn test_mul_div_rounding() {
		let v = U256::from(10);
		assert_eq!(mul_div(v, U256::from(1), U256::from(3), false), U256::from(3));
		assert_eq!(mul_div(v, U256::from(1), U256::from(3), true), U256::from(4));
		assert_eq!(mul_div(U256::MAX, U256::from(2), U256::from(2), false), U256::MAX);
	}

	#[test]
	fn test_decimal_fraction() {
		let (n, d) = decimal_fraction(Decimal::new(5, 3)).unwrap();
		assert_eq!((n, d), (U256::from(5), U256::from(1000)));
		assert!(decimal_fraction(Decimal::new(-1, 2)).is_none());
		assert!(decimal_fraction(Decimal::new(11, 1)).is_none());
	}
}
