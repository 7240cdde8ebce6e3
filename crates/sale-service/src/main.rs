//! Main entry point for the token-sale backend service.
//!
//! Wires the configured storage backend, the node connector, the contract
//! mirror and the queue consumer together, then serves the HTTP API until
//! interrupted.

use clap::Parser;
use sale_auction::AuctionMirror;
use sale_config::{Config, StorageBackend};
use sale_connector::implementations::alloy::ConnectorTimings;
use sale_connector::{AlloyConnector, SaleConnector};
use sale_queue::QueueConsumer;
use sale_storage::implementations::{file::FileStorage, memory::MemoryStorage};
use sale_storage::{QueueStore, StorageInterface};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod apis;
mod server;

/// Command-line arguments for the sale service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
	fmt().with_env_filter(env_filter).with_target(true).init();

	let config = Config::from_file(&args.config)?;
	tracing::info!("Loaded configuration [{}]", args.config.display());

	let backend: Box<dyn StorageInterface> = match config.storage.backend {
		StorageBackend::Memory => Box::new(MemoryStorage::new()),
		StorageBackend::File => {
			let path = config
				.storage
				.path
				.clone()
				.ok_or("storage.path is required for the file backend")?;
			Box::new(FileStorage::new(path)?)
		}
	};
	let store = Arc::new(QueueStore::new(backend));

	let timings = ConnectorTimings {
		block_poll: Duration::from_secs(config.node.poll_interval_secs),
		receipt_poll: Duration::from_secs(config.queue.receipt_poll_secs),
		receipt_timeout: Duration::from_secs(config.queue.receipt_timeout_secs),
	};
	let connector: Arc<dyn SaleConnector> = Arc::new(
		AlloyConnector::connect(&config.node.http_url, config.sale.contract_address, timings)
			.await?,
	);

	let mirror = AuctionMirror::init(
		Arc::clone(&connector),
		config.sale.start_block,
		Duration::from_secs(config.chart.resync_interval_secs),
	)
	.await?;

	let consumer = Arc::new(QueueConsumer::new(
		Arc::clone(&connector),
		Arc::clone(&store),
	));

	tracing::info!("Started sale backend");

	let mirror_task = Arc::clone(&mirror).run();
	let consumer_task = {
		let consumer = Arc::clone(&consumer);
		async move { consumer.run().await }
	};
	let server_task = server::start_server(config, mirror, store, connector);

	tokio::select! {
		_ = mirror_task => tracing::info!("Contract mirror stopped"),
		_ = consumer_task => tracing::info!("Queue consumer stopped"),
		result = server_task => {
			tracing::info!("API server stopped");
			result?;
		}
		_ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
	}

	Ok(())
}
