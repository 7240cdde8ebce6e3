//! HTTP server for the sale API.
//!
//! Routes live under `/api`, matching the paths the sale frontend calls.

use crate::apis;
use axum::{
	routing::{get, post},
	Router,
};
use sale_auction::AuctionMirror;
use sale_config::Config;
use sale_connector::SaleConnector;
use sale_storage::QueueStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Live read model of the sale contract.
	pub mirror: Arc<AuctionMirror>,
	/// Persisted transaction queue.
	pub store: Arc<QueueStore>,
	/// Node facade, for per-request reads and direct submissions.
	pub connector: Arc<dyn SaleConnector>,
	/// Complete configuration.
	pub config: Config,
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	config: Config,
	mirror: Arc<AuctionMirror>,
	store: Arc<QueueStore>,
	connector: Arc<dyn SaleConnector>,
) -> Result<(), Box<dyn std::error::Error>> {
	let bind_address = format!("{}:{}", config.http.host, config.http.port);

	let state = AppState {
		mirror,
		store,
		connector,
		config,
	};

	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/auction", get(apis::auction::get_auction))
				.route("/auction/chart", get(apis::auction::get_chart))
				.route("/auction/constants", get(apis::auction::get_constants))
				.route("/auction/dummy-deal", get(apis::auction::get_dummy_deal))
				.route("/auction/tx/{hash}", get(apis::auction::get_tx_status))
				.route("/accounts/{address}", get(apis::accounts::get_account))
				.route("/accounts/{address}/nonce", get(apis::accounts::get_nonce))
				.route("/tx", post(apis::tx::post_tx))
				.route("/config", get(apis::config::get_config)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state);

	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Sale API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
