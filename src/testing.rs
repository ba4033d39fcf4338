//! In-process fakes for the daemon, crypto and address collaborators.
//!
//! Conventions used by the fakes:
//! - private keys start with `sk`, and the matching public key swaps that prefix for `pk`;
//! - an output sent to spend key `S` at index `i` has the output key `S/i`;
//! - an address is `addr:<public spend key>:<public view key>`;
//! - a transaction public key of `bad` fails derivation, one starting with
//!   `no-key-image` fails key image generation.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::crypto::{AddressCodec, AddressKeys, CryptoProvider, KeyPair, PrivateKeys};
use crate::daemon::types::*;
use crate::daemon::DaemonRpcClient;
use crate::wallet::{SubWalletLedger, WalletError, WalletKeys};

pub const PRIVATE_VIEW_KEY: &str = "sk-view";
pub const PUBLIC_VIEW_KEY: &str = "pk-view";
pub const PRIMARY_PRIVATE_SPEND_KEY: &str = "sk-primary";
pub const PRIMARY_SPEND_KEY: &str = "pk-primary";
pub const PRIMARY_ADDRESS: &str = "addr:pk-primary:pk-view";

#[derive(Default)]
pub struct FakeCryptoProvider {
	generated: AtomicUsize,
}

impl CryptoProvider for FakeCryptoProvider {
	fn generate_key_derivation(
		&self,
		transaction_public_key: &str,
		private_view_key: &str,
	) -> Result<String, WalletError> {
		if transaction_public_key == "bad" {
			return Err(WalletError::Crypto("invalid transaction public key".into()));
		}
		Ok(format!("{}*{}", transaction_public_key, private_view_key))
	}

	fn underive_public_key(
		&self,
		_derivation: &str,
		output_index: u64,
		output_key: &str,
	) -> Result<String, WalletError> {
		match output_key.rsplit_once('/') {
			Some((spend_key, index)) if index == output_index.to_string() => Ok(spend_key.to_string()),
			_ => Ok(format!("unknown:{}", output_key)),
		}
	}

	fn generate_key_image(
		&self,
		_public_spend_key: &str,
		private_spend_key: &str,
		derivation: &str,
		output_index: u64,
	) -> Result<(String, String), WalletError> {
		if derivation.starts_with("no-key-image") {
			return Err(WalletError::Crypto("key image generation failed".into()));
		}
		Ok((
			format!("ki:{}:{}", derivation, output_index),
			format!("eph:{}:{}", private_spend_key, output_index),
		))
	}

	fn generate_key_pair(&self) -> KeyPair {
		let n = self.generated.fetch_add(1, Ordering::SeqCst);
		KeyPair {
			public_key: format!("pk-gen{}", n),
			private_key: format!("sk-gen{}", n),
		}
	}

	fn secret_key_to_public_key(&self, private_key: &str) -> Result<String, WalletError> {
		private_key
			.strip_prefix("sk")
			.map(|rest| format!("pk{}", rest))
			.ok_or_else(|| WalletError::Crypto(format!("invalid private key {}", private_key)))
	}
}

/// Key image the fake crypto provider produces for our output.
pub fn fake_key_image(transaction_public_key: &str, output_index: u64) -> String {
	format!("ki:{}*{}:{}", transaction_public_key, PRIVATE_VIEW_KEY, output_index)
}

#[derive(Default)]
pub struct FakeAddressCodec {
	derivations: AtomicUsize,
}

impl FakeAddressCodec {
	pub fn mnemonic_derivations(&self) -> usize {
		self.derivations.load(Ordering::SeqCst)
	}
}

impl AddressCodec for FakeAddressCodec {
	fn address_to_keys(&self, address: &str) -> Result<AddressKeys, WalletError> {
		let parts: Vec<&str> = address.split(':').collect();
		match parts.as_slice() {
			["addr", spend, view] if !spend.is_empty() && !view.is_empty() => Ok(AddressKeys {
				public_spend_key: spend.to_string(),
				public_view_key: view.to_string(),
			}),
			_ => Err(WalletError::InvalidAddress(address.to_string())),
		}
	}

	fn keys_to_address(
		&self,
		public_spend_key: &str,
		public_view_key: &str,
	) -> Result<String, WalletError> {
		Ok(format!("addr:{}:{}", public_spend_key, public_view_key))
	}

	fn is_valid_mnemonic_word(&self, word: &str) -> bool {
		["abbey", "abducts", "ability", "able", "abort"].contains(&word)
	}

	fn mnemonic_to_private_keys(&self, words: &[&str]) -> Result<PrivateKeys, WalletError> {
		self.derivations.fetch_add(1, Ordering::SeqCst);
		Ok(PrivateKeys {
			private_spend_key: format!("sk-mnemonic-{}", words.len()),
			private_view_key: "sk-mnemonic-view".to_string(),
		})
	}
}

pub fn new_ledger() -> SubWalletLedger {
	ledger_with_keys(Some(PRIMARY_PRIVATE_SPEND_KEY.to_string()))
}

pub fn new_view_ledger() -> SubWalletLedger {
	ledger_with_keys(None)
}

fn ledger_with_keys(private_spend_key: Option<String>) -> SubWalletLedger {
	SubWalletLedger::new(
		Config::default(),
		Arc::new(FakeCryptoProvider::default()),
		Arc::new(FakeAddressCodec::default()),
		WalletKeys {
			address: PRIMARY_ADDRESS.to_string(),
			private_view_key: PRIVATE_VIEW_KEY.to_string(),
			private_spend_key,
		},
		0,
		0,
	)
	.unwrap()
}

pub fn block(height: u64, hash: &str, transactions: Vec<RawTransaction>) -> Block {
	Block {
		hash: hash.to_string(),
		height,
		timestamp: 1_600_000_000 + height * 90,
		coinbase_transaction: None,
		transactions,
	}
}

/// A transaction from someone else paying `outputs` (spend key, amount), with a fee of 10.
pub fn incoming_transaction(hash: &str, transaction_public_key: &str, outputs: &[(&str, u64)]) -> RawTransaction {
	let total: u64 = outputs.iter().map(|(_, amount)| amount).sum();
	RawTransaction {
		hash: hash.to_string(),
		transaction_public_key: transaction_public_key.to_string(),
		unlock_time: 0,
		outputs: outputs
			.iter()
			.enumerate()
			.map(|(i, (spend_key, amount))| KeyOutput {
				key: format!("{}/{}", spend_key, i),
				amount: *amount,
				global_index: Some(i as u64),
			})
			.collect(),
		inputs: vec![KeyInput {
			amount: total + 10,
			key_image: format!("foreign-{}", hash),
			output_indexes: vec![],
		}],
		payment_id: String::new(),
	}
}

/// A transaction spending `key_images` (key image, amount) and paying `outputs`.
pub fn spending_transaction(
	hash: &str,
	transaction_public_key: &str,
	key_images: &[(&str, u64)],
	outputs: &[(&str, u64)],
) -> RawTransaction {
	let mut transaction = incoming_transaction(hash, transaction_public_key, outputs);
	transaction.inputs = key_images
		.iter()
		.map(|(key_image, amount)| KeyInput {
			amount: *amount,
			key_image: key_image.to_string(),
			output_indexes: vec![],
		})
		.collect();
	transaction
}

/// Scriptable daemon. Every call succeeds with empty data unless told otherwise.
pub struct FakeDaemonClient {
	info: Mutex<NodeInfo>,
	fee: Mutex<NodeFee>,
	offline: AtomicBool,
	/// `None` entries fail the call.
	sync_responses: Mutex<VecDeque<Option<WalletSyncResponse>>>,
	sync_requests: Mutex<Vec<WalletSyncRequest>>,
	sync_delay: Mutex<Option<Duration>>,
	not_found: Mutex<HashSet<String>>,
	sent: Mutex<Vec<Vec<u8>>>,
	unreachable_probes: AtomicUsize,
	probes: AtomicUsize,
}

impl Default for FakeDaemonClient {
	fn default() -> Self {
		Self {
			info: Mutex::new(NodeInfo {
				height: 0,
				network_height: 0,
				incoming_connections: 3,
				outgoing_connections: 5,
				hashrate: 1000,
			}),
			fee: Mutex::new(NodeFee::default()),
			offline: AtomicBool::new(false),
			sync_responses: Mutex::new(VecDeque::new()),
			sync_requests: Mutex::new(Vec::new()),
			sync_delay: Mutex::new(None),
			not_found: Mutex::new(HashSet::new()),
			sent: Mutex::new(Vec::new()),
			unreachable_probes: AtomicUsize::new(0),
			probes: AtomicUsize::new(0),
		}
	}
}

impl FakeDaemonClient {
	pub fn set_info(&self, height: u64, network_height: u64) {
		let mut info = self.info.lock().unwrap();
		info.height = height;
		info.network_height = network_height;
	}

	pub fn set_fee(&self, address: &str, amount: i64) {
		*self.fee.lock().unwrap() = NodeFee {
			address: address.to_string(),
			amount,
			status: "OK".to_string(),
		};
	}

	/// Every call fails from now on.
	pub fn go_offline(&self) {
		self.offline.store(true, Ordering::SeqCst);
	}

	pub fn go_online(&self) {
		self.offline.store(false, Ordering::SeqCst);
	}

	pub fn set_reachable_after(&self, failed_probes: usize) {
		self.unreachable_probes.store(failed_probes, Ordering::SeqCst);
	}

	pub fn reachability_probes(&self) -> usize {
		self.probes.load(Ordering::SeqCst)
	}

	pub fn push_sync_blocks(&self, blocks: Vec<Block>) {
		self.sync_responses.lock().unwrap().push_back(Some(WalletSyncResponse {
			blocks,
			top_block: None,
			synced: false,
		}));
	}

	pub fn push_sync_response(&self, response: WalletSyncResponse) {
		self.sync_responses.lock().unwrap().push_back(Some(response));
	}

	pub fn push_sync_failure(&self) {
		self.sync_responses.lock().unwrap().push_back(None);
	}

	pub fn set_sync_delay(&self, delay: Duration) {
		*self.sync_delay.lock().unwrap() = Some(delay);
	}

	pub fn sync_requests(&self) -> Vec<WalletSyncRequest> {
		self.sync_requests.lock().unwrap().clone()
	}

	pub fn set_not_found(&self, hashes: Vec<String>) {
		*self.not_found.lock().unwrap() = hashes.into_iter().collect();
	}

	pub fn sent_transactions(&self) -> Vec<Vec<u8>> {
		self.sent.lock().unwrap().clone()
	}

	fn check_online(&self) -> Result<(), DaemonError> {
		if self.offline.load(Ordering::SeqCst) {
			Err(DaemonError::Status(503))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl DaemonRpcClient for FakeDaemonClient {
	async fn get_info(&self) -> Result<NodeInfo, DaemonError> {
		self.check_online()?;
		Ok(self.info.lock().unwrap().clone())
	}

	async fn get_fee(&self) -> Result<NodeFee, DaemonError> {
		self.check_online()?;
		Ok(self.fee.lock().unwrap().clone())
	}

	async fn get_wallet_sync_data(
		&self,
		request: &WalletSyncRequest,
	) -> Result<WalletSyncResponse, DaemonError> {
		self.sync_requests.lock().unwrap().push(request.clone());

		let delay = *self.sync_delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		self.check_online()?;
		let next = self.sync_responses.lock().unwrap().pop_front();
		match next {
			Some(Some(response)) => Ok(response),
			Some(None) => Err(DaemonError::Status(500)),
			None => Ok(WalletSyncResponse::default()),
		}
	}

	async fn send_raw_transaction(&self, raw_transaction: &[u8]) -> Result<SendOutcome, DaemonError> {
		self.check_online()?;
		self.sent.lock().unwrap().push(raw_transaction.to_vec());
		Ok(SendOutcome {
			success: true,
			error: None,
		})
	}

	async fn get_random_outputs(
		&self,
		amounts: &[u64],
		mixin: u64,
	) -> Result<Vec<RandomOutputs>, DaemonError> {
		self.check_online()?;
		Ok(amounts
			.iter()
			.map(|amount| RandomOutputs {
				amount: *amount,
				outputs: (0..mixin)
					.map(|i| RandomOutput {
						index: i,
						key: format!("decoy-{}-{}", amount, i),
					})
					.collect(),
			})
			.collect())
	}

	async fn get_transaction_status(
		&self,
		hashes: &[String],
	) -> Result<TransactionStatus, DaemonError> {
		self.check_online()?;
		let not_found = self.not_found.lock().unwrap();
		let (missing, known): (Vec<String>, Vec<String>) =
			hashes.iter().cloned().partition(|h| not_found.contains(h));
		Ok(TransactionStatus {
			in_pool: known,
			in_block: Vec::new(),
			not_found: missing,
		})
	}

	async fn get_global_indexes_for_range(
		&self,
		_start_height: u64,
		_end_height: u64,
	) -> Result<std::collections::HashMap<String, Vec<u64>>, DaemonError> {
		self.check_online()?;
		Ok(Default::default())
	}

	async fn is_reachable(&self) -> bool {
		self.probes.fetch_add(1, Ordering::SeqCst);
		if self.offline.load(Ordering::SeqCst) {
			return false;
		}
		let remaining = self.unreachable_probes.load(Ordering::SeqCst);
		if remaining > 0 {
			self.unreachable_probes.store(remaining - 1, Ordering::SeqCst);
			return false;
		}
		true
	}
}
