//! Progress tracking for wallet synchronization.
//!
//! [`SyncProgressTracker`] counts the blocks and transactions the synchronizer
//! applies in one session, notices when block heights skip and logs a progress
//! line every thousand blocks.

use tracing::{info, warn};

/// Logged progress lines are at least this many blocks apart.
const PROGRESS_LOG_INTERVAL: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
	/// Height the session started from
	start_height: u64,
	/// The highest block height applied so far
	highest_processed_height: u64,
	has_processed_blocks: bool,
	blocks_processed: usize,
	transactions_processed: usize,
	forks: usize,
	/// Heights where the daemon skipped ahead, as (last seen, next seen)
	gaps: Vec<(u64, u64)>,
	last_logged_height: u64,
}

impl SyncProgressTracker {
	pub fn new(start_height: u64) -> Self {
		Self {
			start_height,
			highest_processed_height: start_height,
			has_processed_blocks: false,
			blocks_processed: 0,
			transactions_processed: 0,
			forks: 0,
			gaps: Vec::new(),
			last_logged_height: start_height,
		}
	}

	/// Record an applied block and the number of our transactions in it.
	pub fn record_block(&mut self, height: u64, transactions: usize) {
		if self.has_processed_blocks && height > self.highest_processed_height + 1 {
			self.gaps
				.push((self.highest_processed_height, height));
		}

		self.highest_processed_height = if self.has_processed_blocks {
			self.highest_processed_height.max(height)
		} else {
			height
		};
		self.has_processed_blocks = true;
		self.blocks_processed += 1;
		self.transactions_processed += transactions;
	}

	/// The chain forked at `height`; heights from there on will be seen again.
	pub fn record_fork(&mut self, height: u64) {
		self.forks += 1;
		self.highest_processed_height = height.saturating_sub(1);
		self.last_logged_height = self.last_logged_height.min(self.highest_processed_height);
	}

	/// Log progress every thousand blocks, or now when `force` is set.
	pub fn log_progress(&mut self, force: bool) {
		let blocks_since_last_log = self
			.highest_processed_height
			.saturating_sub(self.last_logged_height);
		let should_log = force || blocks_since_last_log >= PROGRESS_LOG_INTERVAL;

		if should_log && self.has_processed_blocks {
			info!(
				"Sync progress: {} blocks, {} transactions processed up to height {}",
				self.blocks_processed, self.transactions_processed, self.highest_processed_height
			);
			self.last_logged_height = self.highest_processed_height;
		}
	}

	pub fn get_stats(&self) -> SyncStats {
		if !self.gaps.is_empty() {
			warn!("Sync skipped heights {} times", self.gaps.len());
		}

		SyncStats {
			start_height: self.start_height,
			highest_processed_height: self.highest_processed_height,
			blocks_processed: self.blocks_processed,
			transactions_processed: self.transactions_processed,
			forks: self.forks,
			gaps: self.gaps.clone(),
		}
	}
}

/// Statistics about one sync session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
	pub start_height: u64,
	pub highest_processed_height: u64,
	pub blocks_processed: usize,
	pub transactions_processed: usize,
	pub forks: usize,
	pub gaps: Vec<(u64, u64)>,
}

impl SyncStats {
	pub fn summary(&self) -> String {
		format!(
			"Sync from {} to {}: {} blocks, {} transactions{}{}",
			self.start_height,
			self.highest_processed_height,
			self.blocks_processed,
			self.transactions_processed,
			if self.forks == 0 {
				String::new()
			} else {
				format!(", {} forks", self.forks)
			},
			if self.gaps.is_empty() {
				String::new()
			} else {
				format!(" ({} gaps)", self.gaps.len())
			}
		)
	}
}
