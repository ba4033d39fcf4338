//! Synchronization core of a CryptoNote-style wallet.
//!
//! - [`config`]: chain constants and synchronizer tunables.
//! - [`utils`]: transaction size and fee model, unlock rules, formatting.
//! - [`crypto`]: the key derivation and address collaborators the wallet consumes.
//! - [`daemon`]: the daemon HTTP client and the liaison that tracks its liveness.
//! - [`wallet`]: the sub-wallet ledger and the engine that keeps it in sync.

pub mod config;
pub mod crypto;
pub mod daemon;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use daemon::{DaemonError, DaemonLink, DaemonRpcClient, HttpDaemonClient};
pub use wallet::{SubWalletLedger, SyncError, WalletError, WalletKeys, WalletSynchronizer};
