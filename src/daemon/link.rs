//! Liaison with a single daemon.
//!
//! [`DaemonLink`] caches what the daemon last told us (heights, peers, hashrate, node
//! fee) and decides when a daemon that still answers has stopped making progress.
//! Transport failures are never fatal on their own: they are folded into the same
//! staleness window as an unchanged height, and only crossing that window produces
//! [`DaemonError::NodeDead`].

use std::collections::HashMap;
use std::sync::Arc;

use backoff::{ExponentialBackoff, future::retry};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::client::DaemonRpcClient;
use super::types::*;
use crate::config::Config;
use crate::crypto::AddressCodec;

struct LinkState {
	local_daemon_block_count: u64,
	network_block_count: u64,
	peer_count: u64,
	last_known_hashrate: u64,
	last_updated_network_height: Instant,
	last_updated_local_height: Instant,
	node_fee: Option<NodeFee>,
	connected: bool,
	/// Blocks requested per sync call, adapted to how the daemon copes.
	block_count: u64,
}

/// Tracks one daemon's progress and forwards wallet requests to it.
pub struct DaemonLink {
	client: Arc<dyn DaemonRpcClient>,
	config: Config,
	/// When set, a node fee is accepted only if its address decodes.
	fee_address_validator: Option<Arc<dyn AddressCodec>>,
	state: RwLock<LinkState>,
}

impl DaemonLink {
	pub fn new(client: Arc<dyn DaemonRpcClient>, config: Config) -> Self {
		let now = Instant::now();
		let block_count = config.blocks_per_daemon_request.max(1);

		Self {
			client,
			config,
			fee_address_validator: None,
			state: RwLock::new(LinkState {
				local_daemon_block_count: 0,
				network_block_count: 0,
				peer_count: 0,
				last_known_hashrate: 0,
				last_updated_network_height: now,
				last_updated_local_height: now,
				node_fee: None,
				connected: false,
				block_count,
			}),
		}
	}

	/// Reject node fees whose address does not decode with `codec`.
	pub fn with_fee_address_validator(mut self, codec: Arc<dyn AddressCodec>) -> Self {
		self.fee_address_validator = Some(codec);
		self
	}

	/// Wait for the daemon to answer, then load its info and fee.
	///
	/// Retries with exponential backoff for up to `daemon_init_timeout` seconds.
	pub async fn init(&self) -> Result<(), DaemonError> {
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(self.config.daemon_init_timeout()),
			..ExponentialBackoff::default()
		};

		retry(policy, || async {
			if self.client.is_reachable().await {
				Ok(())
			} else {
				debug!("Daemon not reachable yet, retrying");
				Err(backoff::Error::transient(DaemonError::Unreachable))
			}
		})
		.await?;

		let (info, fee) = futures::join!(self.refresh_info(), self.refresh_fee());
		info?;
		fee?;

		if self.network_block_count().await == 0 {
			error!("Daemon reported a network height of zero");
			return Err(DaemonError::NetworkBlockCount);
		}

		info!("Connected to daemon");
		Ok(())
	}

	/// Fetch daemon info and update heights, peers and hashrate.
	///
	/// Fails with `NodeDead` once neither height has changed within its window,
	/// whether because the daemon is stuck or because it stopped answering.
	pub async fn refresh_info(&self) -> Result<(), DaemonError> {
		let result = self.client.get_info().await;
		let mut state = self.state.write().await;

		let info = match result {
			Ok(info) => info,
			Err(e) => {
				warn!("Failed to update daemon info: {}", e);
				state.connected = false;
				return self.check_staleness(&state);
			}
		};

		state.connected = true;
		state.peer_count = info.incoming_connections + info.outgoing_connections;
		state.last_known_hashrate = info.hashrate;

		// The daemon counts the block currently being mined
		let network_block_count = info.network_height.saturating_sub(1);

		if info.height != state.local_daemon_block_count
			|| network_block_count != state.network_block_count
		{
			debug!(
				"Daemon height changed: local {} -> {}, network {} -> {}",
				state.local_daemon_block_count,
				info.height,
				state.network_block_count,
				network_block_count
			);
			state.local_daemon_block_count = info.height;
			state.network_block_count = network_block_count;
			Self::mark_progress(&mut state);
			Ok(())
		} else {
			self.check_staleness(&state)
		}
	}

	/// Fetch the node fee. A zero or negative amount never replaces a known fee.
	pub async fn refresh_fee(&self) -> Result<(), DaemonError> {
		let fee = match self.client.get_fee().await {
			Ok(fee) => fee,
			Err(e) => {
				warn!("Failed to update fee info: {}", e);
				let state = self.state.read().await;
				return self.check_staleness(&state);
			}
		};

		if fee.amount <= 0 {
			debug!("Daemon has no node fee configured");
			return Ok(());
		}

		if let Some(codec) = &self.fee_address_validator {
			if let Err(e) = codec.address_to_keys(&fee.address) {
				warn!("Ignoring node fee with invalid address {}: {}", fee.address, e);
				return Ok(());
			}
		}

		info!("Node fee updated: {} to {}", fee.amount, fee.address);
		self.state.write().await.node_fee = Some(fee);
		Ok(())
	}

	/// Request the next batch of blocks, shrinking the batch after a failure and
	/// growing it back after each success.
	pub async fn get_wallet_sync_data(
		&self,
		checkpoints: Vec<String>,
		start_height: u64,
		start_timestamp: u64,
	) -> Result<WalletSyncResponse, DaemonError> {
		let request = WalletSyncRequest {
			checkpoints,
			height: start_height,
			timestamp: start_timestamp,
			count: self.state.read().await.block_count,
			skip_coinbase_transactions: !self.config.scan_coinbase_transactions,
		};

		let result = self.client.get_wallet_sync_data(&request).await;
		let mut state = self.state.write().await;

		match &result {
			Ok(response) => {
				state.block_count = (state.block_count * 2).min(self.config.blocks_per_daemon_request.max(1));
				if !response.blocks.is_empty() {
					Self::mark_progress(&mut state);
				}
			}
			Err(e) => {
				state.block_count = state.block_count.div_ceil(4).max(1);
				error!(
					"Failed to get wallet sync data: {}. Lowering block count to {}",
					e, state.block_count
				);
			}
		}

		result
	}

	pub async fn get_random_outputs(
		&self,
		amounts: &[u64],
		mixin: u64,
	) -> Result<Vec<RandomOutputs>, DaemonError> {
		self.client.get_random_outputs(amounts, mixin).await
	}

	pub async fn send_raw_transaction(&self, raw_transaction: &[u8]) -> Result<SendOutcome, DaemonError> {
		let outcome = self.client.send_raw_transaction(raw_transaction).await?;
		if !outcome.success {
			warn!(
				"Daemon rejected transaction: {}",
				outcome.error.as_deref().unwrap_or("unknown error")
			);
		}
		Ok(outcome)
	}

	pub async fn get_global_indexes_for_range(
		&self,
		start_height: u64,
		end_height: u64,
	) -> Result<HashMap<String, Vec<u64>>, DaemonError> {
		self.client
			.get_global_indexes_for_range(start_height, end_height)
			.await
	}

	/// Which of `hashes` the daemon no longer knows about, in pool or in a block.
	pub async fn get_cancelled_transactions(
		&self,
		hashes: &[String],
	) -> Result<Vec<String>, DaemonError> {
		if hashes.is_empty() {
			return Ok(Vec::new());
		}
		Ok(self.client.get_transaction_status(hashes).await?.not_found)
	}

	pub async fn is_reachable(&self) -> bool {
		self.client.is_reachable().await
	}

	pub async fn local_daemon_block_count(&self) -> u64 {
		self.state.read().await.local_daemon_block_count
	}

	pub async fn network_block_count(&self) -> u64 {
		self.state.read().await.network_block_count
	}

	pub async fn peer_count(&self) -> u64 {
		self.state.read().await.peer_count
	}

	pub async fn hashrate(&self) -> u64 {
		self.state.read().await.last_known_hashrate
	}

	pub async fn node_fee(&self) -> Option<NodeFee> {
		self.state.read().await.node_fee.clone()
	}

	pub async fn is_connected(&self) -> bool {
		self.state.read().await.connected
	}

	pub async fn block_count(&self) -> u64 {
		self.state.read().await.block_count
	}

	fn mark_progress(state: &mut LinkState) {
		let now = Instant::now();
		state.last_updated_network_height = now;
		state.last_updated_local_height = now;
	}

	fn check_staleness(&self, state: &LinkState) -> Result<(), DaemonError> {
		let now = Instant::now();
		let network_elapsed = now.duration_since(state.last_updated_network_height).as_secs();
		let local_elapsed = now.duration_since(state.last_updated_local_height).as_secs();

		if network_elapsed > self.config.max_last_updated_network_height_interval {
			error!("Network height has not changed for {} seconds", network_elapsed);
			return Err(DaemonError::NodeDead {
				seconds_since_update: network_elapsed,
			});
		}

		if local_elapsed > self.config.max_last_updated_local_height_interval {
			error!("Local daemon height has not changed for {} seconds", local_elapsed);
			return Err(DaemonError::NodeDead {
				seconds_since_update: local_elapsed,
			});
		}

		Ok(())
	}
}
