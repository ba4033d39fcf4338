//! Wallet Synchronization Module
//!
//! Keeps a [`SubWalletLedger`](crate::wallet::SubWalletLedger) in step with the
//! chain a daemon serves. It is composed of several submodules:
//!
//! - `synchronizer`: the engine. Fetches block batches, finds our outputs and spends, applies them block by block and handles forks.
//! - `status`: the processed block hashes sent back to the daemon so it knows where we are.
//! - `events`: event types and handler traits for observing the sync from outside.
//! - `progress_tracker`: counts applied blocks and transactions and logs progress.
//! - `state_persistence` and `repositories`: save and restore the status between runs.

/// Event system for decoupled communication during sync
pub mod events;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// Storage backends for the synchronization status
pub mod repositories;
/// Periodic saving and restoring of the synchronization status
pub mod state_persistence;
/// Processed block hashes and checkpoints
pub mod status;
/// Fetch-and-apply engine and run loop
pub mod synchronizer;

pub use events::{EventDispatcher, LoggingEventHandler, SyncEvent, SyncEventHandler};
pub use state_persistence::{CheckpointConfig, StatePersistenceService};
pub use status::SynchronizationStatus;
pub use synchronizer::*;
