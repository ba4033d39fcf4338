//! The sub-wallet ledger.
//!
//! [`SubWalletLedger`] is the single owner of every sub-wallet, every transaction
//! the wallet knows about and the key image ownership map. The key image map is the
//! only thing standing between a replayed or duplicated output and a double-counted
//! balance, so it moves in lockstep with the inputs stored in each sub-wallet.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, trace, warn};

use super::types::*;
use crate::config::Config;
use crate::crypto::{AddressCodec, CryptoProvider};
use crate::utils::{estimated_transaction_size, is_input_unlocked, split_amount_into_denominations};

/// Keys of the primary address the ledger is created for.
#[derive(Debug, Clone)]
pub struct WalletKeys {
	pub address: String,
	pub private_view_key: String,
	/// None for a view wallet.
	pub private_spend_key: Option<String>,
}

#[derive(Clone)]
pub struct SubWalletLedger {
	config: Config,
	crypto: Arc<dyn CryptoProvider>,
	codec: Arc<dyn AddressCodec>,
	is_view_wallet: bool,
	private_view_key: String,
	public_view_key: String,
	/// Sub-wallets by public spend key.
	sub_wallets: HashMap<String, SubWallet>,
	/// Insertion order of `sub_wallets`.
	public_spend_keys: Vec<String>,
	/// Key image to owning public spend key. Always empty for view wallets.
	key_image_owners: HashMap<String, String>,
	transactions: Vec<Transaction>,
	/// Sent by us and not yet seen in a block.
	locked_transactions: Vec<Transaction>,
	transaction_private_keys: HashMap<String, String>,
}

/// Decimal digit count used to bucket inputs by magnitude.
fn magnitude(amount: u64) -> u32 {
	amount.checked_ilog10().map_or(1, |log| log + 1)
}

impl SubWalletLedger {
	/// Create a ledger holding only the primary sub-wallet for `keys`.
	pub fn new(
		config: Config,
		crypto: Arc<dyn CryptoProvider>,
		codec: Arc<dyn AddressCodec>,
		keys: WalletKeys,
		scan_height: u64,
		scan_timestamp: u64,
	) -> Result<Self, WalletError> {
		let address_keys = codec.address_to_keys(&keys.address)?;
		let public_view_key = crypto.secret_key_to_public_key(&keys.private_view_key)?;

		if public_view_key != address_keys.public_view_key {
			return Err(WalletError::InvalidAddress(format!(
				"{} does not match the private view key",
				keys.address
			)));
		}

		if let Some(private_spend_key) = &keys.private_spend_key {
			let public_spend_key = crypto.secret_key_to_public_key(private_spend_key)?;
			if public_spend_key != address_keys.public_spend_key {
				return Err(WalletError::InvalidAddress(format!(
					"{} does not match the private spend key",
					keys.address
				)));
			}
		}

		let is_view_wallet = keys.private_spend_key.is_none();
		let primary = SubWallet::new(
			keys.address,
			address_keys.public_spend_key.clone(),
			keys.private_spend_key,
			scan_height,
			scan_timestamp,
			true,
		);

		Ok(Self {
			config,
			crypto,
			codec,
			is_view_wallet,
			private_view_key: keys.private_view_key,
			public_view_key,
			sub_wallets: HashMap::from([(address_keys.public_spend_key.clone(), primary)]),
			public_spend_keys: vec![address_keys.public_spend_key],
			key_image_owners: HashMap::new(),
			transactions: Vec::new(),
			locked_transactions: Vec::new(),
			transaction_private_keys: HashMap::new(),
		})
	}

	pub fn is_view_wallet(&self) -> bool {
		self.is_view_wallet
	}

	pub fn private_view_key(&self) -> &str {
		&self.private_view_key
	}

	pub fn public_view_key(&self) -> &str {
		&self.public_view_key
	}

	pub fn public_spend_keys(&self) -> &[String] {
		&self.public_spend_keys
	}

	pub fn get_sub_wallet(&self, public_spend_key: &str) -> Option<&SubWallet> {
		self.sub_wallets.get(public_spend_key)
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Rebuild the key image map from the inputs stored in each sub-wallet.
	pub fn init_key_image_map(&mut self) {
		self.key_image_owners.clear();
		if self.is_view_wallet {
			return;
		}

		for sub_wallet in self.sub_wallets.values() {
			for key_image in sub_wallet.key_images() {
				self.key_image_owners
					.insert(key_image.to_string(), sub_wallet.public_spend_key.clone());
			}
		}
	}

	pub fn prune_spent_inputs(&mut self, prune_height: u64) {
		for sub_wallet in self.sub_wallets.values_mut() {
			sub_wallet.prune_spent_inputs(prune_height);
		}
	}

	/// Forget everything and rescan every sub-wallet from the given point.
	pub fn reset(&mut self, scan_height: u64, scan_timestamp: u64) {
		info!(
			"Resetting wallet to height {}, timestamp {}",
			scan_height, scan_timestamp
		);
		self.transactions.clear();
		self.locked_transactions.clear();
		self.transaction_private_keys.clear();
		self.key_image_owners.clear();

		for sub_wallet in self.sub_wallets.values_mut() {
			sub_wallet.reset(scan_height, scan_timestamp);
		}
	}

	/// Discard pending transactions and everything at or above `scan_height`.
	pub fn rewind(&mut self, scan_height: u64) {
		info!("Rewinding wallet to height {}", scan_height);
		self.locked_transactions.clear();
		self.remove_forked_transactions(scan_height);
	}

	/// Earliest height and timestamp any sub-wallet wants to scan from.
	pub fn get_min_initial_sync_start(&self) -> (u64, u64) {
		let height = self
			.sub_wallets
			.values()
			.map(|s| s.sync_start_height)
			.min()
			.unwrap_or(0);
		let timestamp = self
			.sub_wallets
			.values()
			.map(|s| s.sync_start_timestamp)
			.min()
			.unwrap_or(0);
		(height, timestamp)
	}

	pub fn get_private_spend_key(&self, public_spend_key: &str) -> Result<String, WalletError> {
		let sub_wallet = self
			.sub_wallets
			.get(public_spend_key)
			.ok_or_else(|| WalletError::AddressNotInWallet(public_spend_key.to_string()))?;

		sub_wallet
			.private_spend_key
			.clone()
			.ok_or(WalletError::IllegalViewWalletOperation)
	}

	pub fn get_primary_sub_wallet(&self) -> Result<&SubWallet, WalletError> {
		self.sub_wallets
			.values()
			.find(|s| s.is_primary_address)
			.ok_or(WalletError::NoPrimaryAddress)
	}

	pub fn get_primary_address(&self) -> Result<String, WalletError> {
		Ok(self.get_primary_sub_wallet()?.address.clone())
	}

	pub fn get_primary_private_spend_key(&self) -> Result<String, WalletError> {
		self.get_primary_sub_wallet()?
			.private_spend_key
			.clone()
			.ok_or(WalletError::IllegalViewWalletOperation)
	}

	pub fn get_addresses(&self) -> Vec<String> {
		self.public_spend_keys
			.iter()
			.filter_map(|key| self.sub_wallets.get(key))
			.map(|s| s.address.clone())
			.collect()
	}

	pub fn get_wallet_count(&self) -> usize {
		self.sub_wallets.len()
	}

	pub fn get_locked_transaction_hashes(&self) -> Vec<String> {
		self.locked_transactions
			.iter()
			.map(|t| t.hash.clone())
			.collect()
	}

	/// Record a confirmed transaction. A pending copy of it is dropped; a
	/// transaction already confirmed is ignored. Returns whether it was new.
	pub fn add_transaction(&mut self, transaction: Transaction) -> bool {
		trace!("Transaction {}", transaction.hash);

		self.locked_transactions
			.retain(|t| t.hash != transaction.hash);

		if self.transactions.iter().any(|t| t.hash == transaction.hash) {
			debug!("Already seen transaction {}, ignoring", transaction.hash);
			return false;
		}

		self.transactions.push(transaction);
		true
	}

	/// Record a transaction we sent that is not mined yet.
	pub fn add_unconfirmed_transaction(&mut self, transaction: Transaction) -> bool {
		trace!("Unconfirmed transaction {}", transaction.hash);

		let known = self
			.locked_transactions
			.iter()
			.chain(self.transactions.iter())
			.any(|t| t.hash == transaction.hash);

		if known {
			debug!(
				"Already seen unconfirmed transaction {}, ignoring",
				transaction.hash
			);
			return false;
		}

		self.locked_transactions.push(transaction);
		true
	}

	/// Store an owned output. For spend wallets this also claims its key image,
	/// and a key image that is already claimed is never stored again.
	pub fn store_transaction_input(
		&mut self,
		public_spend_key: &str,
		input: TransactionInput,
	) -> Result<(), WalletError> {
		if !self.sub_wallets.contains_key(public_spend_key) {
			return Err(WalletError::SubWalletNotFound(public_spend_key.to_string()));
		}

		if !self.is_view_wallet {
			if let Some(owner) = self.key_image_owners.get(&input.key_image) {
				if owner != public_spend_key {
					warn!(
						"Key image {} already belongs to {}, ignoring input",
						input.key_image, owner
					);
				}
				return Ok(());
			}
			self.key_image_owners
				.insert(input.key_image.clone(), public_spend_key.to_string());
		}

		trace!("Input key image {}", input.key_image);

		if let Some(sub_wallet) = self.sub_wallets.get_mut(public_spend_key) {
			sub_wallet.store_transaction_input(input, self.is_view_wallet);
		}
		Ok(())
	}

	/// Track change we sent ourselves so it shows up in the locked balance.
	pub fn store_unconfirmed_incoming_input(
		&mut self,
		public_spend_key: &str,
		input: UnconfirmedInput,
	) -> Result<(), WalletError> {
		self.sub_wallets
			.get_mut(public_spend_key)
			.ok_or_else(|| WalletError::SubWalletNotFound(public_spend_key.to_string()))?
			.unconfirmed_incoming_amounts
			.push(input);
		Ok(())
	}

	fn owner_of_mut(&mut self, key_image: &str) -> Result<&mut SubWallet, WalletError> {
		let owner = self
			.key_image_owners
			.get(key_image)
			.ok_or_else(|| WalletError::SubWalletNotFound(key_image.to_string()))?;

		self.sub_wallets
			.get_mut(owner)
			.ok_or_else(|| WalletError::SubWalletNotFound(owner.clone()))
	}

	/// The input with `key_image` was spent in a block at `spend_height`.
	pub fn mark_input_as_spent(&mut self, key_image: &str, spend_height: u64) -> Result<(), WalletError> {
		self.owner_of_mut(key_image)?
			.mark_input_as_spent(key_image, spend_height);
		Ok(())
	}

	/// The input with `key_image` is used by `transaction_hash`, which is in the pool.
	pub fn mark_input_as_locked(
		&mut self,
		key_image: &str,
		transaction_hash: &str,
	) -> Result<(), WalletError> {
		self.owner_of_mut(key_image)?
			.mark_input_as_locked(key_image, transaction_hash);
		Ok(())
	}

	/// Drop a sent transaction that never made it into a block and release its inputs.
	pub fn remove_cancelled_transaction(&mut self, transaction_hash: &str) {
		info!("Removing cancelled transaction {}", transaction_hash);
		self.locked_transactions
			.retain(|t| t.hash != transaction_hash);

		for sub_wallet in self.sub_wallets.values_mut() {
			sub_wallet.remove_cancelled_transaction(transaction_hash);
		}
	}

	/// Drop every transaction and input from blocks at or above `fork_height`.
	/// Calling this again with the same height changes nothing.
	pub fn remove_forked_transactions(&mut self, fork_height: u64) {
		self.transactions
			.retain(|t| t.block_height < fork_height);

		let is_view_wallet = self.is_view_wallet;
		let removed: Vec<String> = self
			.sub_wallets
			.values_mut()
			.flat_map(|s| s.remove_forked_inputs(fork_height, is_view_wallet))
			.collect();

		for key_image in removed {
			self.key_image_owners.remove(&key_image);
		}
	}

	pub fn convert_sync_timestamp_to_height(&mut self, timestamp: u64, height: u64) {
		for sub_wallet in self.sub_wallets.values_mut() {
			sub_wallet.convert_sync_timestamp_to_height(timestamp, height);
		}
	}

	/// Whether `input` is still unspent in one of our sub-wallets and unlocked at `height`.
	pub fn have_spendable_input(&self, input: &TransactionInput, height: u64) -> bool {
		self.sub_wallets.values().any(|s| {
			s.unspent_inputs.iter().any(|i| {
				i.key_image == input.key_image
					&& is_input_unlocked(&self.config, i.unlock_time, height)
			})
		})
	}

	/// Owner of a key image. View wallets never know.
	pub fn get_key_image_owner(&self, key_image: &str) -> Option<String> {
		if self.is_view_wallet {
			return None;
		}
		self.key_image_owners.get(key_image).cloned()
	}

	/// Key image and private ephemeral for an output we own. View wallets get an
	/// empty key image.
	pub fn get_tx_input_key_image(
		&self,
		public_spend_key: &str,
		derivation: &str,
		output_index: u64,
	) -> Result<(String, Option<String>), WalletError> {
		let sub_wallet = self
			.sub_wallets
			.get(public_spend_key)
			.ok_or_else(|| WalletError::SubWalletNotFound(public_spend_key.to_string()))?;

		match (&sub_wallet.private_spend_key, self.is_view_wallet) {
			(Some(private_spend_key), false) => {
				let (key_image, private_ephemeral) = self.crypto.generate_key_image(
					public_spend_key,
					private_spend_key,
					derivation,
					output_index,
				)?;
				Ok((key_image, Some(private_ephemeral)))
			}
			_ => Ok((String::new(), None)),
		}
	}

	pub fn store_tx_private_key(&mut self, transaction_private_key: &str, transaction_hash: &str) {
		self.transaction_private_keys
			.insert(transaction_hash.to_string(), transaction_private_key.to_string());
	}

	pub fn get_tx_private_key(&self, transaction_hash: &str) -> Option<&str> {
		self.transaction_private_keys
			.get(transaction_hash)
			.map(String::as_str)
	}

	/// Public spend keys for `addresses`, or every sub-wallet when empty.
	fn resolve_addresses(&self, addresses: &[String]) -> Result<Vec<String>, WalletError> {
		if addresses.is_empty() {
			return Ok(self.public_spend_keys.clone());
		}

		addresses
			.iter()
			.map(|address| {
				let keys = self.codec.address_to_keys(address)?;
				if self.sub_wallets.contains_key(&keys.public_spend_key) {
					Ok(keys.public_spend_key)
				} else {
					Err(WalletError::SubWalletNotFound(address.clone()))
				}
			})
			.collect()
	}

	/// Public spend key for a single address, if it names one of our sub-wallets.
	fn resolve_address(&self, address: &str) -> Result<String, WalletError> {
		let keys = self.codec.address_to_keys(address)?;
		if self.sub_wallets.contains_key(&keys.public_spend_key) {
			Ok(keys.public_spend_key)
		} else {
			Err(WalletError::AddressNotInWallet(address.to_string()))
		}
	}

	/// Summed balance of the given addresses, or of the whole wallet when empty.
	pub fn get_balance(&self, current_height: u64, addresses: &[String]) -> Result<Balance, WalletError> {
		let keys = self.resolve_addresses(addresses)?;

		Ok(keys
			.iter()
			.filter_map(|key| self.sub_wallets.get(key))
			.map(|s| s.get_balance(&self.config, current_height))
			.fold(Balance::default(), |total, b| Balance {
				unlocked: total.unlocked + b.unlocked,
				locked: total.locked + b.locked,
			}))
	}

	fn collect_spendable(&self, keys: &[String], current_height: u64) -> Vec<TxInputAndOwner> {
		keys.iter()
			.filter_map(|key| self.sub_wallets.get(key))
			.flat_map(|s| s.get_spendable_inputs(&self.config, current_height))
			.collect()
	}

	/// Every unspent, unlocked input of the given addresses (all when empty),
	/// grouped by decimal magnitude. Smaller magnitudes come first, and within
	/// a magnitude larger amounts come first.
	pub fn get_spendable_transaction_inputs(
		&self,
		addresses: &[String],
		current_height: u64,
	) -> Result<Vec<TxInputAndOwner>, WalletError> {
		let keys = self.resolve_addresses(addresses)?;
		let mut inputs = self.collect_spendable(&keys, current_height);
		inputs.sort_by_key(|i| i.input.amount);

		let buckets = inputs
			.into_iter()
			.into_group_map_by(|i| magnitude(i.input.amount));

		Ok(buckets
			.into_iter()
			.sorted_by_key(|(digits, _)| *digits)
			.flat_map(|(_, bucket)| bucket.into_iter().rev())
			.collect())
	}

	/// Inputs for a fusion transaction: the smallest amounts of the most
	/// populated magnitude, as many as fit in a fusion transaction. Empty when
	/// fewer than the minimum fusion input count are available.
	pub fn get_fusion_transaction_inputs(
		&self,
		addresses: &[String],
		mixin: u64,
		current_height: u64,
	) -> Result<Vec<TxInputAndOwner>, WalletError> {
		let keys = self.resolve_addresses(addresses)?;
		let inputs = self.collect_spendable(&keys, current_height);

		let bucket = inputs
			.into_iter()
			.into_group_map_by(|i| magnitude(i.input.amount))
			.into_iter()
			.sorted_by_key(|(digits, _)| *digits)
			.map(|(_, bucket)| bucket)
			.max_by_key(|bucket| bucket.len())
			.unwrap_or_default();

		let mut selected = Vec::new();
		let mut total: u64 = 0;

		for input in bucket.into_iter().sorted_by_key(|i| i.input.amount) {
			let candidate_total = total + input.input.amount;
			let num_outputs =
				split_amount_into_denominations(&self.config, candidate_total, true).len() as u64;
			let size = estimated_transaction_size(
				mixin,
				selected.len() as u64 + 1,
				num_outputs,
				false,
				0,
			);

			if size > self.config.max_fusion_tx_size {
				break;
			}

			total = candidate_total;
			selected.push(input);
		}

		if selected.len() < self.config.fusion_tx_min_input_count {
			debug!(
				"Only {} inputs available for fusion, need {}",
				selected.len(),
				self.config.fusion_tx_min_input_count
			);
			return Ok(Vec::new());
		}

		Ok(selected)
	}

	fn filter_transactions(
		&self,
		transactions: &[Transaction],
		address: Option<&str>,
		include_fusions: bool,
	) -> Result<Vec<Transaction>, WalletError> {
		let public_spend_key = address.map(|a| self.resolve_address(a)).transpose()?;

		Ok(transactions
			.iter()
			.filter(|t| include_fusions || !t.is_fusion_transaction())
			.filter(|t| public_spend_key.as_deref().is_none_or(|key| t.involves(key)))
			.cloned()
			.collect())
	}

	/// Confirmed transactions, optionally for one address only.
	pub fn get_transactions(
		&self,
		address: Option<&str>,
		include_fusions: bool,
	) -> Result<Vec<Transaction>, WalletError> {
		self.filter_transactions(&self.transactions, address, include_fusions)
	}

	pub fn get_num_transactions(
		&self,
		address: Option<&str>,
		include_fusions: bool,
	) -> Result<usize, WalletError> {
		Ok(self.get_transactions(address, include_fusions)?.len())
	}

	/// Sent transactions that are not mined yet, optionally for one address only.
	pub fn get_unconfirmed_transactions(
		&self,
		address: Option<&str>,
		include_fusions: bool,
	) -> Result<Vec<Transaction>, WalletError> {
		self.filter_transactions(&self.locked_transactions, address, include_fusions)
	}

	pub fn get_num_unconfirmed_transactions(
		&self,
		address: Option<&str>,
		include_fusions: bool,
	) -> Result<usize, WalletError> {
		Ok(self
			.get_unconfirmed_transactions(address, include_fusions)?
			.len())
	}

	fn insert_sub_wallet(
		&mut self,
		public_spend_key: String,
		private_spend_key: Option<String>,
		scan_height: u64,
		scan_timestamp: u64,
	) -> Result<String, WalletError> {
		if self.sub_wallets.contains_key(&public_spend_key) {
			return Err(WalletError::SubWalletAlreadyExists(public_spend_key));
		}

		let address = self
			.codec
			.keys_to_address(&public_spend_key, &self.public_view_key)?;

		info!("Adding sub-wallet {}", address);
		self.public_spend_keys.push(public_spend_key.clone());
		self.sub_wallets.insert(
			public_spend_key.clone(),
			SubWallet::new(
				address.clone(),
				public_spend_key,
				private_spend_key,
				scan_height,
				scan_timestamp,
				false,
			),
		);

		Ok(address)
	}

	/// Create a fresh sub-wallet sharing the primary view key. Returns its address.
	pub fn add_sub_wallet(&mut self, scan_height: u64) -> Result<String, WalletError> {
		if self.is_view_wallet {
			return Err(WalletError::IllegalViewWalletOperation);
		}

		let key_pair = self.crypto.generate_key_pair();
		self.insert_sub_wallet(key_pair.public_key, Some(key_pair.private_key), scan_height, 0)
	}

	/// Import a sub-wallet from its private spend key. Returns its address.
	pub fn import_sub_wallet(
		&mut self,
		private_spend_key: &str,
		scan_height: u64,
	) -> Result<String, WalletError> {
		if self.is_view_wallet {
			return Err(WalletError::IllegalViewWalletOperation);
		}

		let public_spend_key = self.crypto.secret_key_to_public_key(private_spend_key)?;
		self.insert_sub_wallet(
			public_spend_key,
			Some(private_spend_key.to_string()),
			scan_height,
			0,
		)
	}

	/// Import a view-only sub-wallet from its public spend key. Returns its address.
	pub fn import_view_sub_wallet(
		&mut self,
		public_spend_key: &str,
		scan_height: u64,
	) -> Result<String, WalletError> {
		if !self.is_view_wallet {
			return Err(WalletError::IllegalNonViewWalletOperation);
		}

		self.insert_sub_wallet(public_spend_key.to_string(), None, scan_height, 0)
	}

	/// Delete a sub-wallet together with its transfers and key images.
	pub fn delete_sub_wallet(&mut self, address: &str) -> Result<(), WalletError> {
		let public_spend_key = self.resolve_address(address)?;

		let is_primary = self
			.sub_wallets
			.get(&public_spend_key)
			.is_some_and(|s| s.is_primary_address);
		if is_primary {
			return Err(WalletError::CannotDeletePrimaryAddress);
		}

		info!("Deleting sub-wallet {}", address);
		self.sub_wallets.remove(&public_spend_key);
		self.public_spend_keys.retain(|k| *k != public_spend_key);
		self.key_image_owners.retain(|_, owner| *owner != public_spend_key);

		for list in [&mut self.transactions, &mut self.locked_transactions] {
			for transaction in list.iter_mut() {
				transaction.transfers.remove(&public_spend_key);
			}
			list.retain(|t| !t.transfers.is_empty());
		}

		Ok(())
	}
}
