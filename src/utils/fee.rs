//! Deterministic size, fee and denomination rules.
//!
//! These functions are pure: every chain constant comes from [`Config`], and the
//! only clock read is in [`is_input_unlocked`], which defers to the pure
//! [`is_input_unlocked_at`].

use crate::config::Config;

const KEY_IMAGE_SIZE: u64 = 32;
const OUTPUT_KEY_SIZE: u64 = 32;
const AMOUNT_SIZE: u64 = 8 + 2;
const GLOBAL_INDEXES_VECTOR_SIZE_SIZE: u64 = 1;
const GLOBAL_INDEXES_INITIAL_VALUE_SIZE: u64 = 4;
const SIGNATURE_SIZE: u64 = 64;
const EXTRA_TAG_SIZE: u64 = 1;
const INPUT_TAG_SIZE: u64 = 1;
const OUTPUT_TAG_SIZE: u64 = 1;
const PUBLIC_KEY_SIZE: u64 = 32;
const TRANSACTION_VERSION_SIZE: u64 = 1;
const TRANSACTION_UNLOCK_TIME_SIZE: u64 = 8 + 2;
const PAYMENT_ID_SIZE: u64 = 34;

/// Estimate the serialized size in bytes of a transaction with the given shape.
pub fn estimated_transaction_size(
	mixin: u64,
	num_inputs: u64,
	num_outputs: u64,
	have_payment_id: bool,
	extra_data_size: u64,
) -> u64 {
	let extra_data = if extra_data_size > 0 {
		extra_data_size + 4
	} else {
		0
	};
	let payment_id = if have_payment_id { PAYMENT_ID_SIZE } else { 0 };

	let header_size = TRANSACTION_VERSION_SIZE
		+ TRANSACTION_UNLOCK_TIME_SIZE
		+ EXTRA_TAG_SIZE
		+ extra_data
		+ PUBLIC_KEY_SIZE
		+ payment_id;

	let input_size = INPUT_TAG_SIZE
		+ AMOUNT_SIZE
		+ KEY_IMAGE_SIZE
		+ SIGNATURE_SIZE
		+ GLOBAL_INDEXES_VECTOR_SIZE_SIZE
		+ GLOBAL_INDEXES_INITIAL_VALUE_SIZE
		+ mixin * SIGNATURE_SIZE;

	let output_size = OUTPUT_TAG_SIZE + OUTPUT_KEY_SIZE + AMOUNT_SIZE;

	header_size + input_size * num_inputs + output_size * num_outputs
}

/// Largest transaction the network will accept at `current_height`.
///
/// Follows the block size growth curve, capped at 125k, minus the space
/// reserved for the miner transaction. The median-size term is ignored on
/// purpose so a transaction valid now stays valid when it gets mined.
///
/// A `block_time` of zero, or one longer than the growth period, leaves no
/// divisor for the curve and yields the capped size.
pub fn get_max_tx_size(config: &Config, current_height: u64, block_time: u64) -> u64 {
	let numerator = current_height.saturating_mul(config.max_block_size_growth_speed_numerator);
	let growth = match config.max_block_size_growth_speed_denominator.checked_div(block_time) {
		Some(denominator) if denominator > 0 => numerator / denominator,
		_ => u64::MAX,
	};
	let x = config.max_block_size_initial.saturating_add(growth);
	let y = 125_000;

	x.min(y).saturating_sub(config.coinbase_blob_reserved_size)
}

/// Fee for a transaction of `transaction_size` bytes at `fee_per_byte`,
/// charged per started chunk.
pub fn get_transaction_fee(config: &Config, transaction_size: u64, fee_per_byte: f64) -> u64 {
	let chunk_size = config.fee_per_byte_chunk_size;
	let num_chunks = transaction_size.div_ceil(chunk_size);

	(num_chunks as f64 * fee_per_byte * chunk_size as f64).ceil() as u64
}

/// Minimum network fee for a transaction of `transaction_size` bytes.
pub fn get_minimum_transaction_fee(config: &Config, transaction_size: u64, _height: u64) -> u64 {
	get_transaction_fee(config, transaction_size, config.minimum_fee_per_byte)
}

/// Split an amount into base-10 denominations, e.g.
/// `1234567 = 1000000 + 200000 + 30000 + 4000 + 500 + 60 + 7`.
///
/// With `prevent_too_large_outputs`, a denomination above the client output cap
/// is replaced by N equal copies, N being the smallest power of ten that brings
/// each copy under the cap.
pub fn split_amount_into_denominations(
	config: &Config,
	amount: u64,
	prevent_too_large_outputs: bool,
) -> Vec<u64> {
	let mut remaining = amount;
	let mut multiplier: u64 = 1;
	let mut split_amounts = Vec::new();

	while remaining >= 1 {
		let denomination = multiplier * (remaining % 10);

		if prevent_too_large_outputs && denomination > config.max_output_size_client {
			let mut num_split_amounts: u64 = 10;
			let mut split_amount = denomination / 10;

			while split_amount > config.max_output_size_client {
				split_amount /= 10;
				num_split_amounts *= 10;
			}

			split_amounts.extend(std::iter::repeat_n(split_amount, num_split_amounts as usize));
		} else if denomination != 0 {
			split_amounts.push(denomination);
		}

		remaining /= 10;
		multiplier = multiplier.saturating_mul(10);
	}

	split_amounts
}

/// Whether an output with `unlock_time` is spendable at `current_height`.
pub fn is_input_unlocked(config: &Config, unlock_time: u64, current_height: u64) -> bool {
	let now = chrono::Utc::now().timestamp().max(0) as u64;
	is_input_unlocked_at(config, unlock_time, current_height, now)
}

/// [`is_input_unlocked`] evaluated against an explicit UNIX timestamp.
pub fn is_input_unlocked_at(
	config: &Config,
	unlock_time: u64,
	current_height: u64,
	now: u64,
) -> bool {
	// Nearly every non-coinbase transaction takes this branch.
	if unlock_time == 0 {
		return true;
	}

	if unlock_time >= config.max_block_number {
		now >= unlock_time
	} else {
		current_height + 1 >= unlock_time
	}
}

/// A sensible sync start timestamp for a freshly created wallet.
pub fn current_timestamp_adjusted(block_target_time: u64) -> u64 {
	let now = chrono::Utc::now().timestamp().max(0) as u64;
	now.saturating_sub(100 * block_target_time)
}
