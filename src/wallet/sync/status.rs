//! Which blocks the wallet has already processed.
//!
//! The daemon works out where to resume from the hashes we send it, so the
//! status keeps the last hundred processed block hashes plus a sparse trail of
//! older checkpoints that still point at the right chain after a deep fork.

use serde::{Deserialize, Serialize};

/// How many recent block hashes are kept.
pub const LAST_KNOWN_BLOCK_HASHES_SIZE: usize = 100;

/// Every block at a multiple of this height is kept as a sparse checkpoint.
pub const BLOCK_HASH_CHECKPOINTS_INTERVAL: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCheckpoint {
	pub height: u64,
	pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationStatus {
	/// Newest first.
	block_hash_checkpoints: Vec<BlockCheckpoint>,
	/// Newest first, at most [`LAST_KNOWN_BLOCK_HASHES_SIZE`].
	last_known_block_hashes: Vec<BlockCheckpoint>,
	last_known_block_height: u64,
}

impl SynchronizationStatus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `hash` as the block processed at `height`.
	pub fn store_block_hash(&mut self, height: u64, hash: &str) {
		self.last_known_block_height = height;

		let checkpoint = BlockCheckpoint {
			height,
			hash: hash.to_string(),
		};

		if height % BLOCK_HASH_CHECKPOINTS_INTERVAL == 0 {
			self.block_hash_checkpoints.insert(0, checkpoint.clone());
		}

		self.last_known_block_hashes.insert(0, checkpoint);
		self.last_known_block_hashes
			.truncate(LAST_KNOWN_BLOCK_HASHES_SIZE);
	}

	/// Hashes to send with a sync request: the recent ones, then the sparse ones.
	pub fn get_processed_block_hash_checkpoints(&self) -> Vec<String> {
		self.last_known_block_hashes
			.iter()
			.chain(self.block_hash_checkpoints.iter())
			.map(|c| c.hash.clone())
			.collect()
	}

	pub fn height(&self) -> u64 {
		self.last_known_block_height
	}

	/// Whether any block has been processed since the last reset.
	pub fn has_processed_blocks(&self) -> bool {
		!self.last_known_block_hashes.is_empty()
	}

	/// Forget every block above `height`.
	pub fn rewind_to(&mut self, height: u64) {
		self.last_known_block_hashes
			.retain(|c| c.height <= height);
		self.block_hash_checkpoints
			.retain(|c| c.height <= height);
		self.last_known_block_height = self
			.last_known_block_hashes
			.first()
			.map_or(height.min(self.last_known_block_height), |c| c.height);
	}

	pub fn reset(&mut self) {
		*self = Self::default();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_recent_hashes_are_capped_newest_first() {
		let mut status = SynchronizationStatus::new();
		for height in 1..=150 {
			status.store_block_hash(height, &format!("hash-{}", height));
		}

		let checkpoints = status.get_processed_block_hash_checkpoints();
		assert_eq!(checkpoints.len(), LAST_KNOWN_BLOCK_HASHES_SIZE);
		assert_eq!(checkpoints[0], "hash-150");
		assert_eq!(checkpoints[99], "hash-51");
		assert_eq!(status.height(), 150);
	}

	#[test]
	fn test_sparse_checkpoints_follow_recent_hashes() {
		let mut status = SynchronizationStatus::new();
		for height in 9_990..=10_200 {
			status.store_block_hash(height, &format!("hash-{}", height));
		}

		let checkpoints = status.get_processed_block_hash_checkpoints();
		assert_eq!(checkpoints.len(), LAST_KNOWN_BLOCK_HASHES_SIZE + 1);
		assert_eq!(checkpoints.last().map(String::as_str), Some("hash-10000"));
	}

	#[test]
	fn test_rewind_drops_hashes_above_height() {
		let mut status = SynchronizationStatus::new();
		for height in 1..=20 {
			status.store_block_hash(height, &format!("hash-{}", height));
		}

		status.rewind_to(14);
		assert_eq!(status.height(), 14);
		assert_eq!(
			status.get_processed_block_hash_checkpoints()[0],
			"hash-14"
		);

		// Rewinding again to the same height is a no-op.
		let before = status.clone();
		status.rewind_to(14);
		assert_eq!(status, before);
	}

	#[test]
	fn test_serde_round_trip_is_lossless() {
		let mut status = SynchronizationStatus::new();
		for height in 4_990..=5_010 {
			status.store_block_hash(height, &format!("hash-{}", height));
		}

		let json = serde_json::to_string(&status).unwrap();
		let restored: SynchronizationStatus = serde_json::from_str(&json).unwrap();
		assert_eq!(restored, status);
		assert_eq!(
			restored.get_processed_block_hash_checkpoints(),
			status.get_processed_block_hash_checkpoints()
		);
	}
}
