//! Chain constants and synchronizer tunables.
//!
//! Every numeric rule the fee model, the daemon liaison and the synchronizer
//! depend on lives in [`Config`]. The defaults match the reference chain; a JSON
//! file can override any subset of them.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration shared by the fee model, the daemon link and the synchronizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Unlock times at or above this value are UNIX timestamps, below it block heights.
	pub max_block_number: u64,
	/// Target seconds between blocks.
	pub block_target_time: u64,
	pub max_block_size_initial: u64,
	pub max_block_size_growth_speed_numerator: u64,
	pub max_block_size_growth_speed_denominator: u64,
	/// Space kept free in every block for the miner transaction.
	pub coinbase_blob_reserved_size: u64,
	/// Largest single output a client should create.
	pub max_output_size_client: u64,
	pub fee_per_byte_chunk_size: u64,
	pub minimum_fee_per_byte: f64,

	/// Blocks handed to the apply step per tick.
	pub blocks_per_tick: usize,
	/// Upper bound for the adaptive daemon sync batch.
	pub blocks_per_daemon_request: u64,
	/// Seconds without new blocks before the daemon is declared dead.
	pub max_last_fetched_block_interval: u64,
	/// Seconds without a network height change before the daemon is declared dead.
	pub max_last_updated_network_height_interval: u64,
	/// Seconds without a local height change before the daemon is declared dead.
	pub max_last_updated_local_height_interval: u64,
	pub scan_coinbase_transactions: bool,
	/// Consecutive "not found" answers before a locked transaction counts as cancelled.
	pub cancelled_transaction_fail_limit: u32,

	pub fusion_tx_min_input_count: usize,
	pub max_fusion_tx_size: u64,

	pub mnemonic_length: usize,
	pub decimal_places: u32,
	pub ticker: String,

	/// Seconds between daemon info/fee refreshes in the run loop.
	pub daemon_update_interval: u64,
	/// Seconds between cancelled-transaction checks in the run loop.
	pub locked_transactions_check_interval: u64,
	/// Milliseconds to sleep when a tick asks for it.
	pub sync_idle_sleep_ms: u64,
	/// Persist the sync status every N processed blocks.
	pub checkpoint_interval: u64,
	/// Seconds before a single daemon HTTP request times out.
	pub daemon_request_timeout: u64,
	/// Seconds `init` keeps retrying an unreachable daemon.
	pub daemon_init_timeout: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			max_block_number: 500_000_000,
			block_target_time: 90,
			max_block_size_initial: 100_000,
			max_block_size_growth_speed_numerator: 100 * 1024,
			max_block_size_growth_speed_denominator: 365 * 24 * 60 * 60,
			coinbase_blob_reserved_size: 600,
			max_output_size_client: 100_000_000_000,
			fee_per_byte_chunk_size: 256,
			minimum_fee_per_byte: 500.0 / 256.0,

			blocks_per_tick: 1,
			blocks_per_daemon_request: 100,
			max_last_fetched_block_interval: 60 * 3,
			max_last_updated_network_height_interval: 60 * 3,
			max_last_updated_local_height_interval: 60 * 3,
			scan_coinbase_transactions: false,
			cancelled_transaction_fail_limit: 3,

			fusion_tx_min_input_count: 12,
			max_fusion_tx_size: 30_000,

			mnemonic_length: 25,
			decimal_places: 5,
			ticker: "XKR".to_string(),

			daemon_update_interval: 10,
			locked_transactions_check_interval: 30,
			sync_idle_sleep_ms: 1_000,
			checkpoint_interval: 100,
			daemon_request_timeout: 30,
			daemon_init_timeout: 60,
		}
	}
}

impl Config {
	/// Load a configuration file. Keys missing from the file keep their defaults.
	pub fn from_json_file(path: &Path) -> Result<Self, std::io::Error> {
		let content = std::fs::read_to_string(path)?;
		let config: Self = serde_json::from_str(&content)
			.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
		config.validate()?;
		Ok(config)
	}

	/// Reject values the fee model cannot compute with.
	pub fn validate(&self) -> Result<(), std::io::Error> {
		let invalid = |message: String| -> Result<(), std::io::Error> {
			Err(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
		};

		if self.block_target_time == 0 {
			return invalid("block_target_time must be positive".to_string());
		}
		if self.block_target_time > self.max_block_size_growth_speed_denominator {
			return invalid(format!(
				"block_target_time {} exceeds max_block_size_growth_speed_denominator {}",
				self.block_target_time, self.max_block_size_growth_speed_denominator
			));
		}
		if self.fee_per_byte_chunk_size == 0 {
			return invalid("fee_per_byte_chunk_size must be positive".to_string());
		}
		if 10u64.checked_pow(self.decimal_places).is_none() {
			return invalid(format!("decimal_places {} is too large", self.decimal_places));
		}
		Ok(())
	}

	pub fn daemon_update_interval(&self) -> Duration {
		Duration::from_secs(self.daemon_update_interval)
	}

	pub fn locked_transactions_check_interval(&self) -> Duration {
		Duration::from_secs(self.locked_transactions_check_interval)
	}

	pub fn sync_idle_sleep(&self) -> Duration {
		Duration::from_millis(self.sync_idle_sleep_ms)
	}

	pub fn daemon_request_timeout(&self) -> Duration {
		Duration::from_secs(self.daemon_request_timeout)
	}

	pub fn daemon_init_timeout(&self) -> Duration {
		Duration::from_secs(self.daemon_init_timeout)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_default_matches_reference_chain() {
		let config = Config::default();
		assert_eq!(config.max_block_number, 500_000_000);
		assert_eq!(config.max_block_size_growth_speed_numerator, 102_400);
		assert_eq!(
			config.max_block_size_growth_speed_denominator / 30,
			1_051_200
		);
		assert_eq!(
			config.minimum_fee_per_byte * config.fee_per_byte_chunk_size as f64,
			500.0
		);
	}

	#[test]
	fn test_partial_file_keeps_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{ "blocks_per_tick": 5, "ticker": "TRTL" }}"#).unwrap();

		let config = Config::from_json_file(file.path()).unwrap();
		assert_eq!(config.blocks_per_tick, 5);
		assert_eq!(config.ticker, "TRTL");
		assert_eq!(config.max_last_fetched_block_interval, 180);
	}

	#[test]
	fn test_invalid_file_is_an_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "not json").unwrap();

		let err = Config::from_json_file(file.path()).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
	}

	#[test]
	fn test_unusable_values_are_rejected() {
		assert!(Config::default().validate().is_ok());

		for body in [
			r#"{ "block_target_time": 0 }"#,
			r#"{ "block_target_time": 100, "max_block_size_growth_speed_denominator": 99 }"#,
			r#"{ "fee_per_byte_chunk_size": 0 }"#,
			r#"{ "decimal_places": 20 }"#,
		] {
			let mut file = tempfile::NamedTempFile::new().unwrap();
			write!(file, "{}", body).unwrap();

			let err = Config::from_json_file(file.path()).unwrap_err();
			assert_eq!(err.kind(), std::io::ErrorKind::InvalidData, "{}", body);
		}
	}
}
