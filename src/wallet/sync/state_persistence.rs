//! State persistence service for wallet synchronization.
//!
//! [`StatePersistenceService`] saves the [`SynchronizationStatus`] as the
//! synchronizer makes progress and hands it back on startup, so a restarted
//! wallet resumes from its last checkpoint instead of its scan height.

use crate::config::Config;
use crate::wallet::SyncError;
use crate::wallet::sync::repositories::{FileSyncStatusRepository, SyncStatusRepository};
use crate::wallet::sync::status::SynchronizationStatus;

use log::{info, warn};
use std::path::PathBuf;

pub struct StatePersistenceService {
	status_repo: Box<dyn SyncStatusRepository>,
	checkpoint_config: CheckpointConfig,
}

impl StatePersistenceService {
	/// File-backed persistence in `data_dir`.
	pub fn new(data_dir: PathBuf, checkpoint_config: CheckpointConfig) -> Self {
		Self::with_repository(
			Box::new(FileSyncStatusRepository::new(data_dir)),
			checkpoint_config,
		)
	}

	pub fn with_repository(
		status_repo: Box<dyn SyncStatusRepository>,
		checkpoint_config: CheckpointConfig,
	) -> Self {
		Self {
			status_repo,
			checkpoint_config,
		}
	}

	pub fn checkpoint_config(&self) -> &CheckpointConfig {
		&self.checkpoint_config
	}

	/// Whether enough blocks were applied since the last save.
	pub fn is_due(&self, blocks_since_last_save: u64) -> bool {
		self.checkpoint_config.interval > 0 && blocks_since_last_save >= self.checkpoint_config.interval
	}

	/// Save the status and drop checkpoints beyond the retention count.
	pub async fn save_status(&self, status: &SynchronizationStatus) -> Result<(), SyncError> {
		self.status_repo.save(status).await?;

		if let Err(e) = self
			.status_repo
			.cleanup_old(self.checkpoint_config.keep_count)
			.await
		{
			warn!("Failed to clean up old sync statuses: {}", e);
		}
		Ok(())
	}

	/// The newest saved status, if any.
	pub async fn restore_status(&self) -> Result<Option<SynchronizationStatus>, SyncError> {
		match self.status_repo.find_latest().await? {
			Some((path, height)) => {
				let status = self.status_repo.load(&path).await?;
				info!("Restored sync status from height {}", height);
				Ok(Some(status))
			}
			None => Ok(None),
		}
	}
}

/// Configuration for checkpoint saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointConfig {
	/// Save checkpoint every N blocks.
	pub interval: u64,
	/// Number of checkpoints to keep.
	pub keep_count: usize,
}

impl Default for CheckpointConfig {
	fn default() -> Self {
		Self {
			interval: 100,
			keep_count: 2,
		}
	}
}

impl From<&Config> for CheckpointConfig {
	fn from(config: &Config) -> Self {
		Self {
			interval: config.checkpoint_interval,
			..Self::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_due() {
		let dir = tempfile::tempdir().unwrap();
		let service = StatePersistenceService::new(dir.path().to_path_buf(), CheckpointConfig::default());
		assert!(!service.is_due(99));
		assert!(service.is_due(100));

		let disabled = StatePersistenceService::new(
			dir.path().to_path_buf(),
			CheckpointConfig {
				interval: 0,
				keep_count: 1,
			},
		);
		assert!(!disabled.is_due(1_000));
	}

	#[tokio::test]
	async fn test_restore_returns_newest_saved_status() {
		let dir = tempfile::tempdir().unwrap();
		let service = StatePersistenceService::new(dir.path().to_path_buf(), CheckpointConfig::default());
		assert!(service.restore_status().await.unwrap().is_none());

		let mut status = SynchronizationStatus::new();
		for height in 1..=3 {
			status.store_block_hash(height, &format!("hash-{}", height));
			service.save_status(&status).await.unwrap();
		}

		let restored = service.restore_status().await.unwrap().unwrap();
		assert_eq!(restored, status);

		// Only the two newest are retained.
		let files = std::fs::read_dir(dir.path())
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| !e.file_name().to_string_lossy().ends_with(".meta.json"))
			.count();
		assert_eq!(files, 2);
	}
}
