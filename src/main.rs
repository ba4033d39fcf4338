use std::path::Path;
use std::sync::Arc;

use cryptonote_wallet_sync::daemon::{DaemonLink, HttpDaemonClient};
use cryptonote_wallet_sync::utils::{get_max_tx_size, pretty_print_amount, pretty_print_bytes};
use cryptonote_wallet_sync::{Config, DaemonError};
use tracing::{error, info, warn};

const DEFAULT_DAEMON: &str = "127.0.0.1:11898";

/// Follow a daemon and report its heights, peers and node fee until it dies
/// or the process is interrupted.
async fn monitor(link: &DaemonLink, config: &Config) -> Result<(), DaemonError> {
	link.init().await?;

	if let Some(fee) = link.node_fee().await {
		info!(
			"Node fee: {} to {}",
			pretty_print_amount(fee.amount.max(0) as u64, config.decimal_places, &config.ticker),
			fee.address
		);
	}

	let max_tx_size = get_max_tx_size(
		config,
		link.network_block_count().await,
		config.block_target_time,
	);
	info!("Largest transaction the network accepts: {}", pretty_print_bytes(max_tx_size));

	let mut interval = tokio::time::interval(config.daemon_update_interval());
	loop {
		tokio::select! {
			_ = interval.tick() => {}
			_ = tokio::signal::ctrl_c() => {
				info!("Interrupted, stopping");
				return Ok(());
			}
		}

		if let Err(e) = link.refresh_info().await {
			if e.is_node_dead() {
				return Err(e);
			}
			warn!("Failed to refresh daemon info: {}", e);
		}
		if let Err(e) = link.refresh_fee().await {
			if e.is_node_dead() {
				return Err(e);
			}
		}

		info!(
			"Daemon {} / network {}, {} peers, {} H/s",
			link.local_daemon_block_count().await,
			link.network_block_count().await,
			link.peer_count().await,
			link.hashrate().await
		);
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.init();

	let mut args = std::env::args().skip(1);
	let daemon = args.next().unwrap_or_else(|| DEFAULT_DAEMON.to_string());

	let config = match args.next() {
		Some(path) => match Config::from_json_file(Path::new(&path)) {
			Ok(config) => config,
			Err(e) => {
				error!("Failed to load config {}: {}", path, e);
				std::process::exit(1);
			}
		},
		None => Config::default(),
	};

	let client = match HttpDaemonClient::new(&daemon, false, config.daemon_request_timeout()) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create daemon client: {}", e);
			std::process::exit(1);
		}
	};

	info!("Connecting to daemon at {}", daemon);
	let link = DaemonLink::new(Arc::new(client), config.clone());

	if let Err(e) = monitor(&link, &config).await {
		error!("Daemon monitor stopped: {}", e);
		std::process::exit(1);
	}
}
