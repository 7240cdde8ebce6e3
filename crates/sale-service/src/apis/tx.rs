//! Contribution submission endpoint.
//!
//! Takes a pre-signed transaction, recovers its sender and either submits
//! it immediately (sender already funded) or parks it in the persisted
//! queue until the balance arrives.

use crate::apis::ApiError;
use crate::server::AppState;
use alloy_consensus::{Transaction, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{Bytes, U256};
use axum::extract::State;
use axum::response::Json;
use sale_types::{u256_to_hex, without_0x_prefix, QueueEntry};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct PostTxRequest {
	/// `0x`-prefixed RLP-encoded signed transaction.
	tx: String,
}

/// Handles POST /api/tx requests.
pub async fn post_tx(
	State(state): State<AppState>,
	Json(request): Json<PostTxRequest>,
) -> Result<Json<Value>, ApiError> {
	let raw = hex::decode(without_0x_prefix(&request.tx))
		.map_err(|_| ApiError::BadRequest("Invalid transaction hex".to_string()))?;

	let envelope = TxEnvelope::decode_2718(&mut raw.as_slice())
		.map_err(|e| ApiError::BadRequest(format!("Invalid signed transaction: {e}")))?;
	let sender = envelope
		.recover_signer()
		.map_err(|e| ApiError::BadRequest(format!("Could not recover sender: {e}")))?;

	let gas_price = envelope
		.gas_price()
		.unwrap_or_else(|| envelope.max_fee_per_gas());
	let required = required_wei(envelope.value(), envelope.gas_limit(), gas_price)
		.ok_or_else(|| ApiError::BadRequest("Transaction cost overflows".to_string()))?;

	let raw = Bytes::from(raw);
	let balance = state.connector.balance(sender).await?;

	if balance >= required {
		let hash = state.connector.send_raw_transaction(&raw).await?;
		info!(%hash, from = %sender, "Submitted contribution");
		return Ok(Json(json!({ "hash": hash })));
	}

	let entry = QueueEntry {
		address: sender,
		signed_tx: raw,
		required_wei: required,
		nonce: envelope.nonce(),
	};
	state.store.enqueue(&entry).await?;
	info!(from = %sender, required = %required, balance = %balance, "Queued contribution until sender is funded");

	Ok(Json(json!({ "requiredEth": u256_to_hex(required) })))
}

/// Wei the sender must hold: `value + gas_limit * gas_price`. `None` when
/// the signed values overflow, which no honest wallet produces.
fn required_wei(value: U256, gas_limit: u64, gas_price: u128) -> Option<U256> {
	U256::from(gas_limit)
		.checked_mul(U256::from(gas_price))
		.and_then(|gas| value.checked_add(gas))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn required_wei_sums_value_and_gas() {
		let required = required_wei(U256::from(100u64), 21_000, 5);
		assert_eq!(required, Some(U256::from(105_100u64)));
	}

	#[test]
	fn required_wei_rejects_overflowing_value() {
		assert_eq!(required_wei(U256::MAX, 21_000, 1), None);
	}
}
