//! Event system for wallet synchronization.
//!
//! The synchronizer emits a [`SyncEvent`] whenever something a wallet front end
//! cares about happens: the height moves, a transaction shows up or disappears,
//! the chain forks under us or the daemon stops responding. Handlers are
//! registered with an [`EventDispatcher`] and run in registration order.

use tracing::{error, info, warn};

use crate::utils::pretty_print_amount;
use crate::wallet::{SyncError, Transaction};

/// Events that occur during wallet synchronization
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
	/// The wallet, local daemon or network height moved
	HeightChange {
		wallet_height: u64,
		local_daemon_height: u64,
		network_height: u64,
	},
	/// A confirmed transaction involving one of our sub-wallets was stored
	TransactionAdded(Transaction),
	/// A sent transaction vanished from the daemon and its inputs were released
	TransactionCancelled { hash: String },
	/// Blocks at or above `height` were replaced by the daemon
	Forked { height: u64 },
	/// The wallet caught up with the network
	Synced { height: u64 },
	/// The daemon made no progress for longer than the configured window
	NodeDead { seconds_since_update: u64 },
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
	/// Called for every event dispatched by the synchronizer.
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError>;

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
	pub fn new() -> Self {
		Self {
			handlers: Vec::new(),
		}
	}

	/// Handlers are called in the order they are registered.
	pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
		self.handlers.push(handler);
	}

	pub fn handler_count(&self) -> usize {
		self.handlers.len()
	}

	/// Dispatch an event to all registered handlers.
	///
	/// Errors from handlers are logged, but do not stop other handlers from running.
	pub async fn dispatch(&mut self, event: &SyncEvent) {
		for handler in &mut self.handlers {
			if let Err(e) = handler.handle(event).await {
				error!("Handler {} failed to process event: {}", handler.name(), e);
			}
		}
	}
}

/// Writes every event to the log.
pub struct LoggingEventHandler {
	decimal_places: u32,
	ticker: String,
}

impl LoggingEventHandler {
	pub fn new(decimal_places: u32, ticker: &str) -> Self {
		Self {
			decimal_places,
			ticker: ticker.to_string(),
		}
	}
}

#[async_trait::async_trait]
impl SyncEventHandler for LoggingEventHandler {
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError> {
		match event {
			SyncEvent::HeightChange {
				wallet_height,
				local_daemon_height,
				network_height,
			} => {
				tracing::debug!(
					"Height: wallet {}, daemon {}, network {}",
					wallet_height,
					local_daemon_height,
					network_height
				);
			}
			SyncEvent::TransactionAdded(transaction) => {
				let amount = transaction.total_amount();
				let direction = if amount < 0 { "Outgoing" } else { "Incoming" };
				info!(
					"{} transaction {} at height {}: {}",
					direction,
					transaction.hash,
					transaction.block_height,
					pretty_print_amount(amount.unsigned_abs(), self.decimal_places, &self.ticker)
				);
			}
			SyncEvent::TransactionCancelled { hash } => {
				info!("Transaction {} was cancelled", hash);
			}
			SyncEvent::Forked { height } => {
				warn!("Chain forked at height {}", height);
			}
			SyncEvent::Synced { height } => {
				info!("Wallet synced at height {}", height);
			}
			SyncEvent::NodeDead {
				seconds_since_update,
			} => {
				error!(
					"Daemon made no progress for {} seconds",
					seconds_since_update
				);
			}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"logging"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	struct Recorder {
		seen: Arc<Mutex<Vec<SyncEvent>>>,
	}

	#[async_trait::async_trait]
	impl SyncEventHandler for Recorder {
		async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError> {
			self.seen.lock().unwrap().push(event.clone());
			Ok(())
		}

		fn name(&self) -> &'static str {
			"recorder"
		}
	}

	struct Failing;

	#[async_trait::async_trait]
	impl SyncEventHandler for Failing {
		async fn handle(&mut self, _event: &SyncEvent) -> Result<(), SyncError> {
			Err(SyncError::Persistence("disk full".to_string()))
		}

		fn name(&self) -> &'static str {
			"failing"
		}
	}

	#[tokio::test]
	async fn test_failing_handler_does_not_stop_the_others() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let mut dispatcher = EventDispatcher::new();
		dispatcher.register_handler(Box::new(Failing));
		dispatcher.register_handler(Box::new(LoggingEventHandler::new(5, "XKR")));
		dispatcher.register_handler(Box::new(Recorder { seen: seen.clone() }));
		assert_eq!(dispatcher.handler_count(), 3);

		dispatcher.dispatch(&SyncEvent::Forked { height: 10 }).await;
		dispatcher.dispatch(&SyncEvent::Synced { height: 12 }).await;

		assert_eq!(
			*seen.lock().unwrap(),
			vec![
				SyncEvent::Forked { height: 10 },
				SyncEvent::Synced { height: 12 }
			]
		);
	}
}
