use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::Config;
use crate::daemon::DaemonError;
use crate::utils::is_input_unlocked;

/// An output owned by one of our sub-wallets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionInput {
	/// Empty for view wallets, which cannot derive key images.
	pub key_image: String,
	pub amount: u64,
	/// Height of the block the output arrived in.
	pub block_height: u64,
	pub transaction_public_key: String,
	/// Position of the output within its transaction.
	pub transaction_index: u64,
	/// Filled in lazily when the daemon did not send indexes with the block.
	pub global_output_index: Option<u64>,
	pub key: String,
	/// Height the input was spent at, 0 while unspent.
	pub spend_height: u64,
	pub unlock_time: u64,
	/// Transaction that created the output, or the one spending it while it is locked.
	pub parent_transaction_hash: String,
	pub private_ephemeral: Option<String>,
}

/// Funds we sent to ourselves that are waiting to be mined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnconfirmedInput {
	pub amount: u64,
	pub key: String,
	pub parent_transaction_hash: String,
}

/// An input picked for spending, with the sub-wallet keys needed to sign it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInputAndOwner {
	pub input: TransactionInput,
	pub public_spend_key: String,
	pub private_spend_key: String,
}

/// A transaction as seen by the wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
	/// Amount delta per public spend key. Negative for outgoing funds.
	pub transfers: HashMap<String, i64>,
	pub hash: String,
	pub fee: u64,
	/// 0 while unconfirmed.
	pub block_height: u64,
	pub timestamp: u64,
	pub payment_id: String,
	pub unlock_time: u64,
	pub is_coinbase_transaction: bool,
}

impl Transaction {
	pub fn total_amount(&self) -> i64 {
		self.transfers.values().sum()
	}

	pub fn is_fusion_transaction(&self) -> bool {
		self.fee == 0 && !self.is_coinbase_transaction
	}

	pub fn involves(&self, public_spend_key: &str) -> bool {
		self.transfers.contains_key(public_spend_key)
	}
}

/// Unlocked and locked balance, in atomic units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
	pub unlocked: u64,
	pub locked: u64,
}

/// One spend keypair of the wallet container and the outputs it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubWallet {
	pub address: String,
	pub public_spend_key: String,
	/// None for view wallets.
	pub private_spend_key: Option<String>,
	pub sync_start_height: u64,
	pub sync_start_timestamp: u64,
	pub is_primary_address: bool,
	pub unspent_inputs: Vec<TransactionInput>,
	/// Inputs used by a sent transaction that is not mined yet.
	pub locked_inputs: Vec<TransactionInput>,
	pub spent_inputs: Vec<TransactionInput>,
	pub unconfirmed_incoming_amounts: Vec<UnconfirmedInput>,
}

impl SubWallet {
	pub fn new(
		address: String,
		public_spend_key: String,
		private_spend_key: Option<String>,
		scan_height: u64,
		scan_timestamp: u64,
		is_primary_address: bool,
	) -> Self {
		Self {
			address,
			public_spend_key,
			private_spend_key,
			sync_start_height: scan_height,
			sync_start_timestamp: scan_timestamp,
			is_primary_address,
			unspent_inputs: Vec::new(),
			locked_inputs: Vec::new(),
			spent_inputs: Vec::new(),
			unconfirmed_incoming_amounts: Vec::new(),
		}
	}

	/// Store an input. Duplicates (same key) are ignored.
	pub fn store_transaction_input(&mut self, input: TransactionInput, is_view_wallet: bool) {
		let known = self
			.unspent_inputs
			.iter()
			.chain(self.locked_inputs.iter())
			.chain(self.spent_inputs.iter())
			.any(|i| i.key == input.key);

		if known {
			return;
		}

		if !is_view_wallet {
			// Funds we sent ourselves have now arrived
			self.unconfirmed_incoming_amounts
				.retain(|u| u.key != input.key);
		}

		self.unspent_inputs.push(input);
	}

	/// Move an input from unspent or locked to spent.
	pub fn mark_input_as_spent(&mut self, key_image: &str, spend_height: u64) {
		let position = |inputs: &Vec<TransactionInput>| inputs.iter().position(|i| i.key_image == key_image);

		let input = if let Some(index) = position(&self.unspent_inputs) {
			Some(self.unspent_inputs.remove(index))
		} else if let Some(index) = position(&self.locked_inputs) {
			Some(self.locked_inputs.remove(index))
		} else {
			None
		};

		if let Some(mut input) = input {
			input.spend_height = spend_height;
			self.spent_inputs.push(input);
		}
	}

	/// Move an input from unspent to locked while the spending transaction is in the pool.
	pub fn mark_input_as_locked(&mut self, key_image: &str, locking_transaction_hash: &str) {
		if let Some(index) = self.unspent_inputs.iter().position(|i| i.key_image == key_image) {
			let mut input = self.unspent_inputs.remove(index);
			input.parent_transaction_hash = locking_transaction_hash.to_string();
			self.locked_inputs.push(input);
		}
	}

	/// Return the inputs locked by a cancelled transaction to the unspent pool,
	/// and forget any change it would have sent us.
	pub fn remove_cancelled_transaction(&mut self, transaction_hash: &str) {
		let (released, still_locked): (Vec<_>, Vec<_>) = std::mem::take(&mut self.locked_inputs)
			.into_iter()
			.partition(|i| i.parent_transaction_hash == transaction_hash);

		self.locked_inputs = still_locked;
		self.unspent_inputs.extend(released);
		self.unconfirmed_incoming_amounts
			.retain(|u| u.parent_transaction_hash != transaction_hash);
	}

	/// Drop everything that arrived at or after `fork_height`, and un-spend
	/// anything spent at or after it.
	pub fn remove_forked_inputs(&mut self, fork_height: u64, is_view_wallet: bool) -> Vec<String> {
		let mut removed_key_images = Vec::new();

		let mut keep = |input: &TransactionInput| {
			if input.block_height >= fork_height {
				removed_key_images.push(input.key_image.clone());
				false
			} else {
				true
			}
		};

		self.unspent_inputs.retain(&mut keep);
		self.locked_inputs.retain(&mut keep);
		self.spent_inputs.retain(&mut keep);

		let (unspent, spent): (Vec<_>, Vec<_>) = std::mem::take(&mut self.spent_inputs)
			.into_iter()
			.partition(|i| i.spend_height >= fork_height);

		self.spent_inputs = spent;
		self.unspent_inputs.extend(unspent.into_iter().map(|mut i| {
			i.spend_height = 0;
			i
		}));

		if is_view_wallet {
			Vec::new()
		} else {
			removed_key_images
		}
	}

	/// Forget every input and start scanning again from the given point.
	pub fn reset(&mut self, scan_height: u64, scan_timestamp: u64) {
		self.sync_start_height = scan_height;
		self.sync_start_timestamp = scan_timestamp;
		self.unspent_inputs.clear();
		self.locked_inputs.clear();
		self.spent_inputs.clear();
		self.unconfirmed_incoming_amounts.clear();
	}

	/// Once a start timestamp has been resolved to a height we scan by height only.
	pub fn convert_sync_timestamp_to_height(&mut self, timestamp: u64, height: u64) {
		if self.sync_start_timestamp != 0 && timestamp >= self.sync_start_timestamp {
			self.sync_start_timestamp = 0;
			self.sync_start_height = height;
		}
	}

	/// Spent inputs older than the recent-reorg window can be forgotten.
	pub fn prune_spent_inputs(&mut self, prune_height: u64) {
		self.spent_inputs
			.retain(|i| i.spend_height >= prune_height);
	}

	pub fn get_balance(&self, config: &Config, current_height: u64) -> Balance {
		let mut balance = Balance::default();

		for input in &self.unspent_inputs {
			if is_input_unlocked(config, input.unlock_time, current_height) {
				balance.unlocked += input.amount;
			} else {
				balance.locked += input.amount;
			}
		}

		balance.locked += self
			.unconfirmed_incoming_amounts
			.iter()
			.map(|u| u.amount)
			.sum::<u64>();

		balance
	}

	pub fn get_spendable_inputs(&self, config: &Config, current_height: u64) -> Vec<TxInputAndOwner> {
		self.unspent_inputs
			.iter()
			.filter(|i| is_input_unlocked(config, i.unlock_time, current_height))
			.map(|i| TxInputAndOwner {
				input: i.clone(),
				public_spend_key: self.public_spend_key.clone(),
				private_spend_key: self.private_spend_key.clone().unwrap_or_default(),
			})
			.collect()
	}

	pub fn has_key_image(&self, key_image: &str) -> bool {
		self.unspent_inputs
			.iter()
			.chain(self.locked_inputs.iter())
			.chain(self.spent_inputs.iter())
			.any(|i| i.key_image == key_image)
	}

	pub fn key_images(&self) -> impl Iterator<Item = &str> {
		self.unspent_inputs
			.iter()
			.chain(self.locked_inputs.iter())
			.chain(self.spent_inputs.iter())
			.map(|i| i.key_image.as_str())
	}
}

/// Errors raised by the sub-wallet ledger and key handling
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
	#[error("Sub-wallet not found: {0}")]
	SubWalletNotFound(String),

	#[error("Address is not in this wallet: {0}")]
	AddressNotInWallet(String),

	#[error("Operation is not permitted on a view wallet")]
	IllegalViewWalletOperation,

	#[error("Operation is only permitted on a view wallet")]
	IllegalNonViewWalletOperation,

	#[error("Sub-wallet already exists: {0}")]
	SubWalletAlreadyExists(String),

	#[error("The primary address cannot be deleted")]
	CannotDeletePrimaryAddress,

	#[error("Wallet has no primary address")]
	NoPrimaryAddress,

	#[error("Mnemonic has {actual} words, expected {expected}")]
	MnemonicWrongLength { expected: usize, actual: usize },

	#[error("Mnemonic word is not in the word list: {0}")]
	MnemonicInvalidWord(String),

	#[error("Crypto error: {0}")]
	Crypto(String),

	#[error("Invalid address: {0}")]
	InvalidAddress(String),
}

/// Errors raised while synchronizing the wallet with a daemon
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Daemon error: {0}")]
	Daemon(#[from] DaemonError),

	#[error("Wallet error: {0}")]
	Wallet(#[from] WalletError),

	#[error("Persistence error: {0}")]
	Persistence(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl SyncError {
	/// The daemon stopped making progress for longer than the configured window.
	pub fn is_node_dead(&self) -> bool {
		matches!(self, SyncError::Daemon(e) if e.is_node_dead())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn input(key: &str, amount: u64, block_height: u64) -> TransactionInput {
		TransactionInput {
			key_image: format!("ki-{}", key),
			amount,
			block_height,
			transaction_public_key: "txpk".to_string(),
			transaction_index: 0,
			global_output_index: None,
			key: key.to_string(),
			spend_height: 0,
			unlock_time: 0,
			parent_transaction_hash: format!("tx-{}", key),
			private_ephemeral: None,
		}
	}

	fn wallet() -> SubWallet {
		SubWallet::new("addr".into(), "spend".into(), Some("priv".into()), 0, 0, true)
	}

	#[test]
	fn test_store_input_is_idempotent() {
		let mut sub_wallet = wallet();
		sub_wallet.store_transaction_input(input("a", 10, 1), false);
		sub_wallet.store_transaction_input(input("a", 10, 1), false);
		assert_eq!(sub_wallet.unspent_inputs.len(), 1);
	}

	#[test]
	fn test_spend_lock_and_cancel() {
		let mut sub_wallet = wallet();
		sub_wallet.store_transaction_input(input("a", 10, 1), false);
		sub_wallet.store_transaction_input(input("b", 20, 1), false);

		sub_wallet.mark_input_as_locked("ki-a", "sent");
		sub_wallet.unconfirmed_incoming_amounts.push(UnconfirmedInput {
			amount: 3,
			key: "change".into(),
			parent_transaction_hash: "sent".into(),
		});
		let balance = sub_wallet.get_balance(&Config::default(), 5);
		assert_eq!(balance, Balance { unlocked: 20, locked: 3 });

		sub_wallet.remove_cancelled_transaction("sent");
		assert!(sub_wallet.locked_inputs.is_empty());
		assert!(sub_wallet.unconfirmed_incoming_amounts.is_empty());
		assert_eq!(sub_wallet.get_balance(&Config::default(), 5).unlocked, 30);

		sub_wallet.mark_input_as_spent("ki-b", 7);
		assert_eq!(sub_wallet.spent_inputs[0].spend_height, 7);
		assert_eq!(sub_wallet.get_balance(&Config::default(), 5).unlocked, 10);
	}

	#[test]
	fn test_remove_forked_inputs() {
		let mut sub_wallet = wallet();
		sub_wallet.store_transaction_input(input("old", 10, 5), false);
		sub_wallet.store_transaction_input(input("new", 20, 12), false);
		sub_wallet.mark_input_as_spent("ki-old", 15);

		let removed = sub_wallet.remove_forked_inputs(10, false);
		assert_eq!(removed, vec!["ki-new".to_string()]);
		assert_eq!(sub_wallet.unspent_inputs.len(), 1);
		assert_eq!(sub_wallet.unspent_inputs[0].key, "old");
		assert_eq!(sub_wallet.unspent_inputs[0].spend_height, 0);
		assert!(sub_wallet.spent_inputs.is_empty());

		assert!(sub_wallet.remove_forked_inputs(10, false).is_empty());
	}

	#[test]
	fn test_convert_sync_timestamp() {
		let mut sub_wallet = SubWallet::new("a".into(), "s".into(), None, 0, 1000, false);
		sub_wallet.convert_sync_timestamp_to_height(999, 50);
		assert_eq!(sub_wallet.sync_start_timestamp, 1000);
		sub_wallet.convert_sync_timestamp_to_height(1000, 60);
		assert_eq!(sub_wallet.sync_start_timestamp, 0);
		assert_eq!(sub_wallet.sync_start_height, 60);
	}

	#[test]
	fn test_fusion_flag() {
		let transaction = Transaction {
			transfers: HashMap::from([("s".to_string(), -5)]),
			hash: "h".into(),
			fee: 0,
			block_height: 1,
			timestamp: 0,
			payment_id: String::new(),
			unlock_time: 0,
			is_coinbase_transaction: false,
		};
		assert!(transaction.is_fusion_transaction());
		assert_eq!(transaction.total_amount(), -5);
	}
}
