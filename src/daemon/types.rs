//! Wire types for the daemon's JSON-over-HTTP API

use serde::{Deserialize, Serialize};

/// Response of `GET /info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
	/// Blocks the daemon has stored locally.
	pub height: u64,
	/// Height the daemon believes the network is at, including the block being mined.
	pub network_height: u64,
	#[serde(default, alias = "incoming_connections_count")]
	pub incoming_connections: u64,
	#[serde(default, alias = "outgoing_connections_count")]
	pub outgoing_connections: u64,
	#[serde(default)]
	pub hashrate: u64,
}

/// Response of `GET /fee`: the fee the node operator charges per transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeFee {
	#[serde(default)]
	pub address: String,
	/// A zero or negative amount means no fee is configured.
	#[serde(default)]
	pub amount: i64,
	#[serde(default)]
	pub status: String,
}

/// Body of `POST /sync`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WalletSyncRequest {
	/// Recent block hashes, newest first, so the daemon can find the fork point.
	pub checkpoints: Vec<String>,
	pub height: u64,
	pub timestamp: u64,
	pub count: u64,
	pub skip_coinbase_transactions: bool,
}

/// Response of `POST /sync`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSyncResponse {
	#[serde(default)]
	pub blocks: Vec<Block>,
	/// Present when the wallet is at the tip and no blocks were returned.
	#[serde(default)]
	pub top_block: Option<TopBlock>,
	#[serde(default)]
	pub synced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopBlock {
	pub hash: String,
	pub height: u64,
}

/// A block as served by the sync endpoint, stripped down to what a wallet needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
	pub hash: String,
	pub height: u64,
	#[serde(default)]
	pub timestamp: u64,
	#[serde(default, alias = "coinbaseTX")]
	pub coinbase_transaction: Option<RawTransaction>,
	#[serde(default)]
	pub transactions: Vec<RawTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
	pub hash: String,
	#[serde(alias = "txPublicKey")]
	pub transaction_public_key: String,
	#[serde(default)]
	pub unlock_time: u64,
	#[serde(default)]
	pub outputs: Vec<KeyOutput>,
	/// Empty for coinbase transactions.
	#[serde(default)]
	pub inputs: Vec<KeyInput>,
	#[serde(default, alias = "paymentID")]
	pub payment_id: String,
}

impl RawTransaction {
	/// Fee paid by this transaction. Zero for coinbase transactions.
	pub fn fee(&self) -> u64 {
		if self.inputs.is_empty() {
			return 0;
		}
		let inputs: u64 = self.inputs.iter().map(|i| i.amount).sum();
		let outputs: u64 = self.outputs.iter().map(|o| o.amount).sum();
		inputs.saturating_sub(outputs)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyOutput {
	pub key: String,
	pub amount: u64,
	#[serde(default)]
	pub global_index: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyInput {
	pub amount: u64,
	#[serde(alias = "k_image")]
	pub key_image: String,
	#[serde(default)]
	pub output_indexes: Vec<u64>,
}

/// Body of `POST /indexes/random`.
#[derive(Debug, Clone, Serialize)]
pub struct RandomOutputsRequest<'a> {
	pub amounts: &'a [u64],
	pub count: u64,
}

/// Decoy outputs for one amount, sorted by global index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RandomOutputs {
	pub amount: u64,
	pub outputs: Vec<RandomOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RandomOutput {
	pub index: u64,
	pub key: String,
}

/// Response of `POST /transaction/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
	#[serde(default)]
	pub in_pool: Vec<String>,
	#[serde(default)]
	pub in_block: Vec<String>,
	#[serde(default)]
	pub not_found: Vec<String>,
}

/// One entry of `GET /indexes/{start}/{end}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalIndexes {
	pub hash: String,
	pub indexes: Vec<u64>,
}

/// Body of `POST /sendrawtransaction`.
#[derive(Debug, Clone, Serialize)]
pub struct SendTransactionRequest {
	pub tx_as_hex: String,
}

/// Response of `POST /sendrawtransaction`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendTransactionResponse {
	#[serde(default)]
	pub status: String,
	#[serde(default)]
	pub error: Option<String>,
}

/// Outcome of relaying a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
	pub success: bool,
	pub error: Option<String>,
}

impl From<SendTransactionResponse> for SendOutcome {
	fn from(response: SendTransactionResponse) -> Self {
		let success = response.status.eq_ignore_ascii_case("ok") && response.error.is_none();
		Self {
			success,
			error: response.error,
		}
	}
}

/// Error types for daemon communication and liveness
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
	/// The daemon stopped making progress for longer than the configured window.
	#[error("Daemon has not made progress for {seconds_since_update} seconds")]
	NodeDead { seconds_since_update: u64 },

	#[error("Daemon reported a network height of zero")]
	NetworkBlockCount,

	#[error("Daemon is unreachable")]
	Unreachable,

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("HTTP status error: {0}")]
	Status(u16),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),
}

impl DaemonError {
	pub fn is_node_dead(&self) -> bool {
		matches!(self, DaemonError::NodeDead { .. })
	}
}
