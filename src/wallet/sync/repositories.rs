use crate::wallet::SyncError;
use crate::wallet::sync::status::SynchronizationStatus;
use log::{info, warn};
use std::path::{Path, PathBuf};

const STATUS_FILE_PREFIX: &str = "sync_status_";
const HEIGHT_SEPARATOR: &str = "_height_";

/// Repository for synchronization checkpoints
///
/// The latest status is the one saved last, which after a reset or a fork can
/// be lower than older saves.
#[async_trait::async_trait]
pub trait SyncStatusRepository: Send + Sync {
	async fn save(&self, status: &SynchronizationStatus) -> Result<(), SyncError>;
	async fn find_latest(&self) -> Result<Option<(PathBuf, u64)>, SyncError>;
	async fn load(&self, path: &Path) -> Result<SynchronizationStatus, SyncError>;
	async fn cleanup_old(&self, keep_count: usize) -> Result<(), SyncError>;
}

/// A status file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredStatus {
	path: PathBuf,
	/// Increases with every save.
	sequence: u64,
	height: u64,
}

/// File-based implementation of SyncStatusRepository
///
/// Files are named `sync_status_{sequence}_height_{height}.json`, each with a
/// `.meta.json` companion.
pub struct FileSyncStatusRepository {
	data_dir: PathBuf,
}

impl FileSyncStatusRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_status_filename(&self, sequence: u64, height: u64) -> PathBuf {
		self.data_dir.join(format!(
			"{}{}{}{}.json",
			STATUS_FILE_PREFIX, sequence, HEIGHT_SEPARATOR, height
		))
	}

	fn get_metadata_filename(&self, sequence: u64, height: u64) -> PathBuf {
		self.data_dir.join(format!(
			"{}{}{}{}.meta.json",
			STATUS_FILE_PREFIX, sequence, HEIGHT_SEPARATOR, height
		))
	}

	/// Sequence and height of a status file. Metadata files do not parse.
	fn parse_filename(path: &Path) -> Option<(u64, u64)> {
		let name = path.file_name()?.to_str()?;
		let rest = name.strip_prefix(STATUS_FILE_PREFIX)?.strip_suffix(".json")?;
		let (sequence, height) = rest.split_once(HEIGHT_SEPARATOR)?;
		Some((sequence.parse().ok()?, height.parse().ok()?))
	}

	async fn list_statuses(&self) -> Result<Vec<StoredStatus>, SyncError> {
		let mut statuses = Vec::new();

		let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(statuses),
			Err(e) => return Err(e.into()),
		};

		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			if let Some((sequence, height)) = Self::parse_filename(&path) {
				statuses.push(StoredStatus {
					path,
					sequence,
					height,
				});
			}
		}

		Ok(statuses)
	}
}

#[async_trait::async_trait]
impl SyncStatusRepository for FileSyncStatusRepository {
	async fn save(&self, status: &SynchronizationStatus) -> Result<(), SyncError> {
		tokio::fs::create_dir_all(&self.data_dir).await?;

		let sequence = self
			.list_statuses()
			.await?
			.iter()
			.map(|s| s.sequence + 1)
			.max()
			.unwrap_or(0);
		let height = status.height();
		let metadata = serde_json::json!({
			"sequence": sequence,
			"sync_height": height,
			"checkpoints": status.get_processed_block_hash_checkpoints().len(),
			"timestamp": chrono::Utc::now().to_rfc3339(),
		});

		let metadata_json = serde_json::to_string_pretty(&metadata)
			.map_err(|e| SyncError::Persistence(format!("Failed to serialize metadata: {}", e)))?;
		tokio::fs::write(self.get_metadata_filename(sequence, height), metadata_json)
			.await
			.map_err(|e| {
				SyncError::Persistence(format!("Failed to write sync status metadata: {}", e))
			})?;

		let status_json = serde_json::to_string(status).map_err(|e| {
			SyncError::Persistence(format!("Failed to serialize sync status: {}", e))
		})?;

		let filename = self.get_status_filename(sequence, height);
		tokio::fs::write(&filename, status_json)
			.await
			.map_err(|e| {
				SyncError::Persistence(format!("Failed to write sync status file: {}", e))
			})?;

		info!("Saved sync status to {:?} at height {}", filename, height);
		Ok(())
	}

	async fn find_latest(&self) -> Result<Option<(PathBuf, u64)>, SyncError> {
		Ok(self
			.list_statuses()
			.await?
			.into_iter()
			.max_by_key(|s| s.sequence)
			.map(|s| (s.path, s.height)))
	}

	async fn load(&self, path: &Path) -> Result<SynchronizationStatus, SyncError> {
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			SyncError::Persistence(format!("Failed to read sync status file: {}", e))
		})?;

		let status: SynchronizationStatus = serde_json::from_str(&content).map_err(|e| {
			SyncError::Persistence(format!("Failed to parse sync status file: {}", e))
		})?;

		info!(
			"Loaded sync status from {:?} at height {}",
			path,
			status.height()
		);
		Ok(status)
	}

	async fn cleanup_old(&self, keep_count: usize) -> Result<(), SyncError> {
		let mut statuses = self.list_statuses().await?;
		statuses.sort_by_key(|s| std::cmp::Reverse(s.sequence));

		for status in statuses.into_iter().skip(keep_count) {
			if let Err(e) = tokio::fs::remove_file(&status.path).await {
				warn!("Failed to remove old sync status {:?}: {}", status.path, e);
			}
			// Metadata may never have been written
			let _ = tokio::fs::remove_file(self.get_metadata_filename(status.sequence, status.height)).await;
		}

		Ok(())
	}
}
