//! Input sizes at which sources are sampled.

use alloy_primitives::U256;

const FRACTION_SCALE: u128 = 1_000_000_000_000_000_000;

/// Generates `num_samples` input amounts from near zero up to `max_fill_amount`.
///
/// Step sizes grow by `exp_base` per sample, so a base above one concentrates
/// samples at the small end and a base of one spaces them linearly. The last
/// amount is always exactly `max_fill_amount` and the sequence is strictly
/// increasing whenever `max_fill_amount >= num_samples`; below that it is
/// only non-decreasing.
pub fn get_sample_amounts(max_fill_amount: U256, num_samples: usize, exp_base: f64) -> Vec<U256> {
	if num_samples == 0 {
		return Vec::new();
	}
	if num_samples == 1 {
		return vec![max_fill_amount];
	}

	let base = if exp_base.is_finite() && exp_base > 0.0 {
		exp_base
	} else {
		1.0
	};
	let steps: Vec<f64> = (0..num_samples).map(|i| base.powi(i as i32)).collect();
	let total: f64 = steps.iter().sum();

	let mut amounts = Vec::with_capacity(num_samples);
	let mut cumulative = 0.0;
	for step in &steps {
		cumulative += step / total;
		let fraction = U256::from((cumulative.min(1.0) * FRACTION_SCALE as f64) as u128);
		let scaled = max_fill_amount.saturating_mul(fraction);
		let scale = U256::from(FRACTION_SCALE);
		let mut amount = scaled / scale;
		if scaled % scale != U256::ZERO {
			amount += U256::from(1);
		}
		amounts.push(amount.min(max_fill_amount));
	}

	let last = num_samples - 1;
	amounts[last] = max_fill_amount;
	for i in 1..num_samples {
		if amounts[i] <= amounts[i - 1] {
			amounts[i] = amounts[i - 1].saturating_add(U256::from(1)).min(max_fill_amount);
		}
	}
	// The forward pass can only clip at the top; force the tail back to max.
	amounts[last] = max_fill_amount;
	amounts
}
