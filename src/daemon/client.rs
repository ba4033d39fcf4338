//!
//! JSON-over-HTTP client for the daemon's wallet API.
//!
//! [`DaemonRpcClient`] is the seam the rest of the crate talks to; [`HttpDaemonClient`]
//! is the reqwest-backed implementation used in production. All methods are async and
//! designed for use with Tokio.

use super::types::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Request/response calls the synchronizer makes against a daemon.
#[async_trait]
pub trait DaemonRpcClient: Send + Sync {
	async fn get_info(&self) -> Result<NodeInfo, DaemonError>;

	async fn get_fee(&self) -> Result<NodeFee, DaemonError>;

	async fn get_wallet_sync_data(
		&self,
		request: &WalletSyncRequest,
	) -> Result<WalletSyncResponse, DaemonError>;

	async fn send_raw_transaction(&self, raw_transaction: &[u8]) -> Result<SendOutcome, DaemonError>;

	/// Decoy outputs for each amount, `mixin` per amount, sorted by global index.
	async fn get_random_outputs(
		&self,
		amounts: &[u64],
		mixin: u64,
	) -> Result<Vec<RandomOutputs>, DaemonError>;

	async fn get_transaction_status(
		&self,
		hashes: &[String],
	) -> Result<TransactionStatus, DaemonError>;

	/// Global output indexes of every transaction in blocks `[start, end)`, by transaction hash.
	async fn get_global_indexes_for_range(
		&self,
		start_height: u64,
		end_height: u64,
	) -> Result<HashMap<String, Vec<u64>>, DaemonError>;

	/// Cheap liveness probe. Says nothing about whether the daemon is making progress.
	async fn is_reachable(&self) -> bool;
}

/// Daemon client over plain HTTP(S)
#[derive(Clone)]
pub struct HttpDaemonClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Scheme, host and port, without a trailing slash.
	base_url: String,
}

impl HttpDaemonClient {
	/// Create a new daemon client.
	///
	/// # Arguments
	/// * `host` - Host and port, e.g. `localhost:11898`.
	/// * `ssl` - Whether to use `https`.
	/// * `timeout` - Per-request timeout.
	pub fn new(host: &str, ssl: bool, timeout: Duration) -> Result<Self, DaemonError> {
		let http_client = Client::builder().timeout(timeout).build()?;
		let scheme = if ssl { "https" } else { "http" };

		Ok(Self {
			http_client,
			base_url: format!("{}://{}", scheme, host.trim_end_matches('/')),
		})
	}

	/// Create a client against a full base URL such as `http://127.0.0.1:11898`.
	pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, DaemonError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	fn url(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path)
	}

	async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DaemonError> {
		trace!("GET {}", path);
		let response = self.http_client.get(self.url(path)).send().await?;
		Self::parse(response).await
	}

	async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
		&self,
		path: &str,
		body: &B,
	) -> Result<T, DaemonError> {
		trace!("POST {}", path);
		let response = self
			.http_client
			.post(self.url(path))
			.header("Content-Type", "application/json")
			.json(body)
			.send()
			.await?;
		Self::parse(response).await
	}

	async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DaemonError> {
		if !response.status().is_success() {
			return Err(DaemonError::Status(response.status().as_u16()));
		}

		let body = response.bytes().await?;
		Ok(serde_json::from_slice(&body)?)
	}
}

#[async_trait]
impl DaemonRpcClient for HttpDaemonClient {
	async fn get_info(&self) -> Result<NodeInfo, DaemonError> {
		self.get("info").await
	}

	async fn get_fee(&self) -> Result<NodeFee, DaemonError> {
		self.get("fee").await
	}

	async fn get_wallet_sync_data(
		&self,
		request: &WalletSyncRequest,
	) -> Result<WalletSyncResponse, DaemonError> {
		debug!(
			"Requesting {} blocks from height {} ({} checkpoints)",
			request.count,
			request.height,
			request.checkpoints.len()
		);
		self.post("sync", request).await
	}

	async fn send_raw_transaction(&self, raw_transaction: &[u8]) -> Result<SendOutcome, DaemonError> {
		let request = SendTransactionRequest {
			tx_as_hex: hex::encode(raw_transaction),
		};
		let response: SendTransactionResponse = self.post("sendrawtransaction", &request).await?;
		Ok(response.into())
	}

	async fn get_random_outputs(
		&self,
		amounts: &[u64],
		mixin: u64,
	) -> Result<Vec<RandomOutputs>, DaemonError> {
		let request = RandomOutputsRequest {
			amounts,
			count: mixin,
		};
		let mut outputs: Vec<RandomOutputs> = self.post("indexes/random", &request).await?;
		for entry in outputs.iter_mut() {
			entry.outputs.sort_by_key(|o| o.index);
		}
		Ok(outputs)
	}

	async fn get_transaction_status(
		&self,
		hashes: &[String],
	) -> Result<TransactionStatus, DaemonError> {
		self.post("transaction/status", hashes).await
	}

	async fn get_global_indexes_for_range(
		&self,
		start_height: u64,
		end_height: u64,
	) -> Result<HashMap<String, Vec<u64>>, DaemonError> {
		let entries: Vec<GlobalIndexes> = self
			.get(&format!("indexes/{}/{}", start_height, end_height))
			.await?;
		Ok(entries.into_iter().map(|e| (e.hash, e.indexes)).collect())
	}

	async fn is_reachable(&self) -> bool {
		match self.http_client.get(self.url("info")).send().await {
			Ok(response) => response.status().is_success(),
			Err(e) => {
				debug!("Daemon at {} is not reachable: {}", self.base_url, e);
				false
			}
		}
	}
}
