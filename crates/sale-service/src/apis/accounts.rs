//! Account endpoints: balance, contribution totals and queue status.

use crate::apis::{parse_address, ApiError};
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use sale_types::{u256_to_hex, u64_to_hex};
use serde_json::{json, Value};

/// Handles GET /api/accounts/{address} requests.
pub async fn get_account(
	State(state): State<AppState>,
	Path(address): Path<String>,
) -> Result<Json<Value>, ApiError> {
	let address = parse_address(&address)?;

	let balance = state.connector.balance(address).await?;
	let (accounted, received) = state.connector.buyin_of(address).await?;

	let mut body = json!({
		"eth": u256_to_hex(balance),
		"accounted": u256_to_hex(accounted),
		"received": u256_to_hex(received),
	});

	// Surface the queue view so the frontend can follow a queued
	// contribution to its outcome.
	if let Some(status) = state.store.status(address).await? {
		body["queue"] = serde_json::to_value(&status)
			.map_err(|e| ApiError::Internal(e.to_string()))?;
	}

	Ok(Json(body))
}

/// Handles GET /api/accounts/{address}/nonce requests.
pub async fn get_nonce(
	State(state): State<AppState>,
	Path(address): Path<String>,
) -> Result<Json<Value>, ApiError> {
	let address = parse_address(&address)?;
	let nonce = state.connector.next_nonce(address).await?;

	Ok(Json(json!({ "nonce": u64_to_hex(nonce) })))
}
