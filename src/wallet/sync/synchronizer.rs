//! The synchronization engine.
//!
//! [`WalletSynchronizer`] pulls batches of blocks from the daemon through a
//! [`DaemonLink`], works out which outputs and spends belong to the wallet and
//! applies them to the [`SubWalletLedger`] one block at a time.
//!
//! A block is applied in two phases under a single ledger lock: everything it
//! would change is worked out first, and only then is the ledger touched, so a
//! block that fails part way leaves no trace. Only one daemon fetch is ever in
//! flight; a second caller is told the engine is busy instead of queuing.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::events::{EventDispatcher, SyncEvent, SyncEventHandler};
use super::progress_tracker::{SyncProgressTracker, SyncStats};
use super::state_persistence::StatePersistenceService;
use super::status::SynchronizationStatus;
use crate::config::Config;
use crate::crypto::CryptoProvider;
use crate::daemon::{Block, DaemonError, DaemonLink, RawTransaction, TopBlock};
use crate::wallet::{SubWalletLedger, SyncError, Transaction, TransactionInput, WalletError};

/// Where the engine is in its fetch and apply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
	Idle,
	Fetching,
	Applying,
	/// The daemon is behind us or a fetch failed; waiting before trying again.
	WaitingBackoff,
	/// The daemon stopped making progress for longer than the configured window.
	Dead,
}

/// Outputs we own, keyed by the public spend key that owns them.
pub type OwnedOutputs = HashMap<String, Vec<TransactionInput>>;

/// A transaction of ours found in a block, not yet written to the ledger.
struct PendingTransaction {
	transaction: Transaction,
	outputs: OwnedOutputs,
	/// Key images of our inputs this transaction spends.
	spent_key_images: Vec<String>,
}

/// Clears the fetching flag when a download ends, however it ends.
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

pub struct WalletSynchronizer {
	daemon: Arc<DaemonLink>,
	ledger: Arc<Mutex<SubWalletLedger>>,
	crypto: Arc<dyn CryptoProvider>,
	config: Config,

	status: Mutex<SynchronizationStatus>,
	/// Held for a whole fetch and apply cycle, and by reset and rewind.
	cycle: Mutex<()>,
	/// Downloaded blocks waiting to be applied, lowest height first.
	stored_blocks: Mutex<VecDeque<Block>>,
	fetching_blocks: AtomicBool,
	last_downloaded_blocks: Mutex<Instant>,
	/// Consecutive "not found" answers per locked transaction hash.
	cancelled_transactions_fail_count: Mutex<HashMap<String, u32>>,
	state: RwLock<SyncState>,
	synced: AtomicBool,

	dispatcher: Mutex<EventDispatcher>,
	progress: Mutex<SyncProgressTracker>,
	persistence: Option<StatePersistenceService>,
	blocks_since_last_save: AtomicU64,
}

impl WalletSynchronizer {
	pub fn new(
		daemon: Arc<DaemonLink>,
		ledger: Arc<Mutex<SubWalletLedger>>,
		crypto: Arc<dyn CryptoProvider>,
		config: Config,
	) -> Self {
		Self {
			daemon,
			ledger,
			crypto,
			config,
			status: Mutex::new(SynchronizationStatus::new()),
			cycle: Mutex::new(()),
			stored_blocks: Mutex::new(VecDeque::new()),
			fetching_blocks: AtomicBool::new(false),
			last_downloaded_blocks: Mutex::new(Instant::now()),
			cancelled_transactions_fail_count: Mutex::new(HashMap::new()),
			state: RwLock::new(SyncState::Idle),
			synced: AtomicBool::new(false),
			dispatcher: Mutex::new(EventDispatcher::new()),
			progress: Mutex::new(SyncProgressTracker::new(0)),
			persistence: None,
			blocks_since_last_save: AtomicU64::new(0),
		}
	}

	/// Save the sync status through `persistence` and restore it on [`init`](Self::init).
	pub fn with_persistence(mut self, persistence: StatePersistenceService) -> Self {
		self.persistence = Some(persistence);
		self
	}

	pub async fn register_handler(&self, handler: Box<dyn SyncEventHandler>) {
		self.dispatcher.lock().await.register_handler(handler);
	}

	pub fn ledger(&self) -> Arc<Mutex<SubWalletLedger>> {
		self.ledger.clone()
	}

	pub fn daemon(&self) -> Arc<DaemonLink> {
		self.daemon.clone()
	}

	/// Connect to the daemon and pick up the last saved status, if any.
	pub async fn init(&self) -> Result<(), SyncError> {
		self.daemon.init().await?;

		if let Some(persistence) = &self.persistence {
			if let Some(status) = persistence.restore_status().await? {
				info!("Resuming sync from height {}", status.height());
				*self.progress.lock().await = SyncProgressTracker::new(status.height());
				*self.status.lock().await = status;
			}
		}

		Ok(())
	}

	/// Height of the last processed block.
	pub async fn get_height(&self) -> u64 {
		self.status.lock().await.height()
	}

	pub async fn get_state(&self) -> SyncState {
		*self.state.read().await
	}

	pub async fn get_status(&self) -> SynchronizationStatus {
		self.status.lock().await.clone()
	}

	pub async fn get_stats(&self) -> SyncStats {
		self.progress.lock().await.get_stats()
	}

	async fn set_state(&self, state: SyncState) {
		let mut current = self.state.write().await;
		if *current != state {
			trace!("Sync state {:?} -> {:?}", *current, state);
			*current = state;
		}
	}

	async fn dispatch(&self, event: SyncEvent) {
		self.dispatcher.lock().await.dispatch(&event).await;
	}

	/// Download the next batch from the daemon into the block store.
	///
	/// Returns `(success_or_busy, should_sleep)`. A fetch already in flight
	/// answers `(true, false)` without touching the daemon, a daemon that is
	/// behind us answers `(true, true)` and a failed request `(false, true)`.
	pub async fn download_blocks(&self) -> (bool, bool) {
		if self
			.fetching_blocks
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			debug!("Already fetching blocks, skipping");
			return (true, false);
		}
		let _guard = FetchGuard(&self.fetching_blocks);

		let local_daemon_block_count = self.daemon.local_daemon_block_count().await;
		let wallet_height = self.get_height().await;

		if local_daemon_block_count < wallet_height {
			debug!(
				"Daemon is at {} but wallet is at {}, waiting",
				local_daemon_block_count, wallet_height
			);
			self.set_state(SyncState::WaitingBackoff).await;
			return (true, true);
		}

		self.set_state(SyncState::Fetching).await;

		let checkpoints = self
			.status
			.lock()
			.await
			.get_processed_block_hash_checkpoints();
		let (start_height, start_timestamp) = self.ledger.lock().await.get_min_initial_sync_start();

		let response = match self
			.daemon
			.get_wallet_sync_data(checkpoints, start_height, start_timestamp)
			.await
		{
			Ok(response) => response,
			Err(e) => {
				error!("Failed to fetch blocks from daemon: {}", e);
				self.set_state(SyncState::WaitingBackoff).await;
				return (false, true);
			}
		};

		*self.last_downloaded_blocks.lock().await = Instant::now();

		if response.blocks.is_empty() {
			if let Some(top_block) = &response.top_block {
				self.store_top_block(top_block).await;
			}
			self.set_state(SyncState::Idle).await;
			return (true, true);
		}

		debug!(
			"Downloaded {} blocks ({} to {})",
			response.blocks.len(),
			response.blocks.first().map_or(0, |b| b.height),
			response.blocks.last().map_or(0, |b| b.height)
		);

		self.stored_blocks.lock().await.extend(response.blocks);
		(true, false)
	}

	/// Nothing of ours between our height and the daemon tip: jump straight to it.
	async fn store_top_block(&self, top_block: &TopBlock) {
		let mut status = self.status.lock().await;
		if top_block.height > status.height() || !status.has_processed_blocks() {
			debug!("Advancing to top block {} at {}", top_block.hash, top_block.height);
			status.store_block_hash(top_block.height, &top_block.hash);
		}
	}

	/// The next `blocks_per_tick` stored blocks, if any are stored.
	async fn buffered_batch(&self) -> Option<Vec<Block>> {
		let stored = self.stored_blocks.lock().await;
		if stored.is_empty() {
			return None;
		}
		Some(
			stored
				.iter()
				.take(self.config.blocks_per_tick.max(1))
				.cloned()
				.collect(),
		)
	}

	/// Next batch of blocks to apply, and whether the caller should sleep.
	///
	/// Stored blocks are served without a daemon call. Blocks stay stored until
	/// they are applied. Fails with `NodeDead` once no download has succeeded for
	/// longer than `max_last_fetched_block_interval`.
	pub async fn fetch_blocks(&self) -> Result<(Vec<Block>, bool), SyncError> {
		if let Some(blocks) = self.buffered_batch().await {
			return Ok((blocks, false));
		}

		let (success_or_busy, should_sleep) = self.download_blocks().await;

		if success_or_busy {
			*self.last_downloaded_blocks.lock().await = Instant::now();
		} else {
			let seconds_since_update = self.last_downloaded_blocks.lock().await.elapsed().as_secs();
			if seconds_since_update > self.config.max_last_fetched_block_interval {
				error!(
					"No blocks downloaded for {} seconds, daemon is dead",
					seconds_since_update
				);
				self.set_state(SyncState::Dead).await;
				self.dispatch(SyncEvent::NodeDead {
					seconds_since_update,
				})
				.await;
				return Err(DaemonError::NodeDead {
					seconds_since_update,
				}
				.into());
			}
		}

		Ok((self.buffered_batch().await.unwrap_or_default(), should_sleep))
	}

	/// Our outputs in one transaction. A transaction whose keys do not decode
	/// cannot be ours and is skipped.
	fn process_transaction_outputs(
		&self,
		transaction: &RawTransaction,
		block_height: u64,
		ledger: &SubWalletLedger,
	) -> Result<OwnedOutputs, WalletError> {
		let mut owned = OwnedOutputs::new();
		if transaction.outputs.is_empty() {
			return Ok(owned);
		}

		let derivation = match self
			.crypto
			.generate_key_derivation(&transaction.transaction_public_key, ledger.private_view_key())
		{
			Ok(derivation) => derivation,
			Err(e) => {
				warn!("Skipping transaction {}: {}", transaction.hash, e);
				return Ok(owned);
			}
		};

		let public_spend_keys = ledger.public_spend_keys();

		for (index, output) in transaction.outputs.iter().enumerate() {
			let output_index = index as u64;

			let spend_key = match self
				.crypto
				.underive_public_key(&derivation, output_index, &output.key)
			{
				Ok(spend_key) => spend_key,
				Err(e) => {
					warn!(
						"Skipping output {} of transaction {}: {}",
						output_index, transaction.hash, e
					);
					continue;
				}
			};

			if !public_spend_keys.contains(&spend_key) {
				continue;
			}

			let (key_image, private_ephemeral) =
				ledger.get_tx_input_key_image(&spend_key, &derivation, output_index)?;

			trace!(
				"Found output {} of transaction {} for {}",
				output_index, transaction.hash, spend_key
			);

			owned.entry(spend_key).or_default().push(TransactionInput {
				key_image,
				amount: output.amount,
				block_height,
				transaction_public_key: transaction.transaction_public_key.clone(),
				transaction_index: output_index,
				global_output_index: output.global_index,
				key: output.key.clone(),
				spend_height: 0,
				unlock_time: transaction.unlock_time,
				parent_transaction_hash: transaction.hash.clone(),
				private_ephemeral,
			});
		}

		Ok(owned)
	}

	/// Transactions of `block` to scan, with whether each is the coinbase.
	fn transactions_to_scan<'a>(&self, block: &'a Block) -> Vec<(&'a RawTransaction, bool)> {
		let coinbase = block
			.coinbase_transaction
			.as_ref()
			.filter(|_| self.config.scan_coinbase_transactions)
			.map(|t| (t, true));

		coinbase
			.into_iter()
			.chain(block.transactions.iter().map(|t| (t, false)))
			.collect()
	}

	/// Every output in `block` that belongs to one of our sub-wallets.
	pub fn process_block_outputs(
		&self,
		block: &Block,
		ledger: &SubWalletLedger,
	) -> Result<OwnedOutputs, WalletError> {
		let mut owned = OwnedOutputs::new();

		for (transaction, _) in self.transactions_to_scan(block) {
			for (spend_key, inputs) in self.process_transaction_outputs(transaction, block.height, ledger)? {
				owned.entry(spend_key).or_default().extend(inputs);
			}
		}

		Ok(owned)
	}

	/// Work out every change `block` makes to the ledger without making any.
	fn prepare_block(
		&self,
		block: &Block,
		ledger: &SubWalletLedger,
	) -> Result<Vec<PendingTransaction>, WalletError> {
		let mut pending = Vec::new();
		// Key images created earlier in this block, which later transactions may spend
		let mut new_key_images: HashMap<String, String> = HashMap::new();

		for (raw, is_coinbase) in self.transactions_to_scan(block) {
			let mut outputs = self.process_transaction_outputs(raw, block.height, ledger)?;

			let mut spent_key_images = Vec::new();
			let mut transfers: HashMap<String, i64> = HashMap::new();

			if !ledger.is_view_wallet() {
				for input in &raw.inputs {
					let owner = ledger
						.get_key_image_owner(&input.key_image)
						.or_else(|| new_key_images.get(&input.key_image).cloned());

					if let Some(owner) = owner {
						*transfers.entry(owner).or_default() -= input.amount as i64;
						spent_key_images.push(input.key_image.clone());
					}
				}

				for (owner, inputs) in outputs.iter_mut() {
					inputs.retain(|input| {
						if ledger.get_key_image_owner(&input.key_image).is_some()
							|| new_key_images.contains_key(&input.key_image)
						{
							warn!(
								"Key image {} in transaction {} was already claimed, ignoring output",
								input.key_image, raw.hash
							);
							return false;
						}
						new_key_images.insert(input.key_image.clone(), owner.clone());
						true
					});
				}
				outputs.retain(|_, inputs| !inputs.is_empty());
			}

			for (owner, inputs) in &outputs {
				*transfers.entry(owner.clone()).or_default() +=
					inputs.iter().map(|i| i.amount as i64).sum::<i64>();
			}

			if transfers.is_empty() {
				continue;
			}

			pending.push(PendingTransaction {
				transaction: Transaction {
					transfers,
					hash: raw.hash.clone(),
					fee: if is_coinbase { 0 } else { raw.fee() },
					block_height: block.height,
					timestamp: block.timestamp,
					payment_id: raw.payment_id.clone(),
					unlock_time: raw.unlock_time,
					is_coinbase_transaction: is_coinbase,
				},
				outputs,
				spent_key_images,
			});
		}

		Ok(pending)
	}

	/// Apply `block` to the ledger. Returns the transactions that were new.
	fn apply_block(
		&self,
		block: &Block,
		ledger: &mut SubWalletLedger,
	) -> Result<Vec<Transaction>, WalletError> {
		let pending = self.prepare_block(block, ledger)?;

		let mut added = Vec::new();
		for PendingTransaction {
			transaction,
			outputs,
			spent_key_images,
		} in pending
		{
			for (owner, inputs) in outputs {
				for input in inputs {
					ledger.store_transaction_input(&owner, input)?;
				}
			}

			for key_image in &spent_key_images {
				ledger.mark_input_as_spent(key_image, block.height)?;
			}

			if ledger.add_transaction(transaction.clone()) {
				added.push(transaction);
			}
		}

		ledger.convert_sync_timestamp_to_height(block.timestamp, block.height);
		Ok(added)
	}

	/// Apply one block, rewinding first if it replaces blocks we already have.
	pub async fn process_block(&self, block: &Block) -> Result<Vec<Transaction>, SyncError> {
		let (transactions, forked) = {
			let mut ledger = self.ledger.lock().await;
			let mut status = self.status.lock().await;

			let forked = status.has_processed_blocks() && block.height <= status.height();
			let transactions = if forked {
				warn!(
					"Fork detected at height {} (wallet was at {})",
					block.height,
					status.height()
				);
				// Rewound on a copy: a block that fails to apply leaves the ledger as it was
				let mut rewound = ledger.clone();
				rewound.remove_forked_transactions(block.height);
				let transactions = self.apply_block(block, &mut rewound)?;
				*ledger = rewound;

				match block.height.checked_sub(1) {
					Some(height) => status.rewind_to(height),
					None => status.reset(),
				}
				transactions
			} else {
				self.apply_block(block, &mut ledger)?
			};

			status.store_block_hash(block.height, &block.hash);
			(transactions, forked)
		};

		{
			let mut stored = self.stored_blocks.lock().await;
			if stored.front().is_some_and(|b| b.hash == block.hash) {
				stored.pop_front();
			}
		}

		{
			let mut progress = self.progress.lock().await;
			if forked {
				progress.record_fork(block.height);
			}
			progress.record_block(block.height, transactions.len());
			progress.log_progress(false);
		}

		if forked {
			self.synced.store(false, Ordering::SeqCst);
			self.dispatch(SyncEvent::Forked {
				height: block.height,
			})
			.await;
		}

		for transaction in &transactions {
			info!(
				"Added transaction {} at height {}",
				transaction.hash, transaction.block_height
			);
			self.dispatch(SyncEvent::TransactionAdded(transaction.clone()))
				.await;
		}

		self.blocks_since_last_save
			.fetch_add(1, Ordering::SeqCst);
		self.save_status(false).await;

		Ok(transactions)
	}

	/// Fetch one batch and apply it. Returns whether the caller should sleep.
	///
	/// A [`reset`](Self::reset) or [`rewind`](Self::rewind) called meanwhile
	/// waits for the tick to finish.
	pub async fn sync_tick(&self) -> Result<bool, SyncError> {
		let _cycle = self.cycle.lock().await;
		let (blocks, should_sleep) = self.fetch_blocks().await?;

		if !blocks.is_empty() {
			self.set_state(SyncState::Applying).await;

			for block in &blocks {
				if let Err(e) = self.process_block(block).await {
					error!("Failed to process block {} at {}: {}", block.hash, block.height, e);
					self.set_state(SyncState::Idle).await;
					return Err(e);
				}
			}

			self.set_state(SyncState::Idle).await;
			self.dispatch(SyncEvent::HeightChange {
				wallet_height: self.get_height().await,
				local_daemon_height: self.daemon.local_daemon_block_count().await,
				network_height: self.daemon.network_block_count().await,
			})
			.await;
		}

		self.check_synced().await;
		Ok(should_sleep)
	}

	async fn check_synced(&self) {
		let height = self.get_height().await;
		let network_height = self.daemon.network_block_count().await;
		let caught_up = network_height > 0
			&& height >= network_height
			&& self.stored_blocks.lock().await.is_empty();

		if !caught_up {
			self.synced.store(false, Ordering::SeqCst);
			return;
		}

		if !self.synced.swap(true, Ordering::SeqCst) {
			self.progress.lock().await.log_progress(true);
			self.dispatch(SyncEvent::Synced { height }).await;
			self.save_status(true).await;
		}
	}

	async fn save_status(&self, force: bool) {
		let Some(persistence) = &self.persistence else {
			return;
		};

		if !force && !persistence.is_due(self.blocks_since_last_save.load(Ordering::SeqCst)) {
			return;
		}

		let status = self.status.lock().await.clone();
		match persistence.save_status(&status).await {
			Ok(()) => self.blocks_since_last_save.store(0, Ordering::SeqCst),
			Err(e) => warn!("Failed to save sync status: {}", e),
		}
	}

	/// Ask the daemon about `hashes` and drop the ones it has not known about
	/// `cancelled_transaction_fail_limit` times in a row. Returns the dropped hashes.
	pub async fn find_cancelled_transactions(&self, hashes: &[String]) -> Result<Vec<String>, SyncError> {
		let not_found = self.daemon.get_cancelled_transactions(hashes).await?;

		let mut cancelled = Vec::new();
		{
			let mut fail_count = self.cancelled_transactions_fail_count.lock().await;
			fail_count.retain(|hash, _| hashes.contains(hash));

			for hash in hashes {
				if !not_found.contains(hash) {
					fail_count.remove(hash);
					continue;
				}

				let count = fail_count.entry(hash.clone()).or_insert(0);
				*count += 1;
				debug!("Transaction {} not found by daemon ({} times)", hash, count);

				if *count >= self.config.cancelled_transaction_fail_limit {
					fail_count.remove(hash);
					cancelled.push(hash.clone());
				}
			}
		}

		if !cancelled.is_empty() {
			let mut ledger = self.ledger.lock().await;
			for hash in &cancelled {
				ledger.remove_cancelled_transaction(hash);
			}
		}

		for hash in &cancelled {
			self.dispatch(SyncEvent::TransactionCancelled { hash: hash.clone() })
				.await;
		}

		Ok(cancelled)
	}

	/// Check every transaction we sent that is still waiting to be mined.
	pub async fn check_locked_transactions(&self) -> Result<Vec<String>, SyncError> {
		let hashes = self.ledger.lock().await.get_locked_transaction_hashes();
		self.find_cancelled_transactions(&hashes).await
	}

	/// Forget everything and rescan from `scan_height` / `scan_timestamp`.
	pub async fn reset(&self, scan_height: u64, scan_timestamp: u64) {
		let _cycle = self.cycle.lock().await;
		{
			let mut ledger = self.ledger.lock().await;
			let mut status = self.status.lock().await;
			ledger.reset(scan_height, scan_timestamp);
			status.reset();
			self.stored_blocks.lock().await.clear();
		}

		self.cancelled_transactions_fail_count.lock().await.clear();
		self.synced.store(false, Ordering::SeqCst);
		*self.progress.lock().await = SyncProgressTracker::new(scan_height);
		self.set_state(SyncState::Idle).await;
		self.save_status(true).await;
	}

	/// Forget everything from `scan_height` on, keeping earlier confirmed state.
	pub async fn rewind(&self, scan_height: u64) {
		let _cycle = self.cycle.lock().await;
		{
			let mut ledger = self.ledger.lock().await;
			let mut status = self.status.lock().await;
			ledger.rewind(scan_height);
			match scan_height.checked_sub(1) {
				Some(height) => status.rewind_to(height),
				None => status.reset(),
			}
			self.stored_blocks.lock().await.clear();
		}

		self.synced.store(false, Ordering::SeqCst);
		self.progress.lock().await.record_fork(scan_height);
		self.save_status(true).await;
	}

	async fn update_daemon_info(&self) -> Result<(), SyncError> {
		let result = match self.daemon.refresh_info().await {
			Ok(()) => self.daemon.refresh_fee().await,
			Err(e) => Err(e),
		};

		if let Err(e) = result {
			if let DaemonError::NodeDead {
				seconds_since_update,
			} = e
			{
				self.set_state(SyncState::Dead).await;
				self.dispatch(SyncEvent::NodeDead {
					seconds_since_update,
				})
				.await;
			}
			return Err(e.into());
		}

		Ok(())
	}

	/// Sync until `shutdown` flips to true or the daemon is declared dead.
	///
	/// Daemon info and locked transactions are refreshed on their own
	/// intervals. Shutdown is only observed between ticks.
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), SyncError> {
		info!("Starting wallet sync at height {}", self.get_height().await);

		let mut last_daemon_update: Option<Instant> = None;
		let mut last_locked_check = Instant::now();

		loop {
			if *shutdown.borrow() {
				break;
			}

			if last_daemon_update.is_none_or(|t| t.elapsed() >= self.config.daemon_update_interval()) {
				match self.update_daemon_info().await {
					Err(e) if e.is_node_dead() => return Err(e),
					Err(e) => warn!("Failed to update daemon info: {}", e),
					Ok(()) => {}
				}
				last_daemon_update = Some(Instant::now());
			}

			if last_locked_check.elapsed() >= self.config.locked_transactions_check_interval() {
				if let Err(e) = self.check_locked_transactions().await {
					warn!("Failed to check locked transactions: {}", e);
				}
				last_locked_check = Instant::now();
			}

			let should_sleep = match self.sync_tick().await {
				Ok(should_sleep) => should_sleep,
				Err(e) if e.is_node_dead() => return Err(e),
				Err(e) => {
					warn!("Sync tick failed: {}", e);
					true
				}
			};

			if should_sleep {
				tokio::select! {
					_ = tokio::time::sleep(self.config.sync_idle_sleep()) => {}
					changed = shutdown.changed() => {
						if changed.is_err() {
							break;
						}
					}
				}
			}
		}

		self.save_status(true).await;
		info!("Wallet sync stopped. {}", self.get_stats().await.summary());
		Ok(())
	}
}
