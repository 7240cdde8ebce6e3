//! Auction endpoints: snapshot, chart, constants and transaction probes.

use crate::apis::ApiError;
use crate::server::AppState;
use alloy_primitives::{B256, U256};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use sale_types::{timestamp_to_datetime, u256_to_hex, u64_to_hex, ChartPoint, SaleEvent};
use serde::Deserialize;
use serde_json::{json, Value};

/// Handles GET /api/auction requests: the live state snapshot.
pub async fn get_auction(State(state): State<AppState>) -> Json<Value> {
	let snapshot = state.mirror.state();
	let constants = state.mirror.constants();

	Json(json!({
		"block": u64_to_hex(snapshot.block_number),
		"connected": state.mirror.connected(),
		"contractAddress": constants.contract_address,
		"currentPrice": u256_to_hex(snapshot.current_price),
		"endTime": timestamp_to_datetime(snapshot.end_time),
		"tokensAvailable": u256_to_hex(snapshot.tokens_available),
		"totalAccounted": u256_to_hex(snapshot.total_accounted),
		"totalReceived": u256_to_hex(snapshot.total_received),
		"halted": snapshot.halted,
	}))
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
	/// Only return points strictly after this time.
	since: Option<DateTime<Utc>>,
}

/// Handles GET /api/auction/chart requests.
pub async fn get_chart(
	State(state): State<AppState>,
	Query(query): Query<ChartQuery>,
) -> Json<Vec<ChartPoint>> {
	let chart = state.mirror.chart();
	let points = match query.since {
		Some(since) => chart
			.iter()
			.filter(|point| point.time > since)
			.cloned()
			.collect(),
		None => chart.as_ref().clone(),
	};
	Json(points)
}

/// Handles GET /api/auction/constants requests.
pub async fn get_constants(State(state): State<AppState>) -> Json<Value> {
	let constants = state.mirror.constants();

	Json(json!({
		"DUST_LIMIT": u256_to_hex(constants.dust_limit),
		"STATEMENT_HASH": constants.statement_hash,
		"BONUS_LATCH": u256_to_hex(constants.bonus_latch),
		"BONUS_MIN_DURATION": u256_to_hex(constants.bonus_min_duration),
		"BONUS_MAX_DURATION": u256_to_hex(constants.bonus_max_duration),
		"USDWEI": u256_to_hex(constants.usdwei),
		"DIVISOR": u256_to_hex(constants.divisor),
		"admin": constants.admin,
		"beginTime": timestamp_to_datetime(constants.begin_time),
		"tokenCap": u256_to_hex(constants.token_cap),
		"treasury": constants.treasury,
		"contractAddress": constants.contract_address,
	}))
}

/// Handles GET /api/auction/dummy-deal requests.
///
/// Quotes `theDeal` for a fixed 0.01 ETH contribution; the frontend uses
/// it to cross-check its local price curve against the contract.
pub async fn get_dummy_deal(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
	let value = U256::from(10u64).pow(U256::from(16u64));
	let deal = state.connector.the_deal(value).await?;

	Ok(Json(json!({
		"accounted": u256_to_hex(deal.accounted),
		"refund": deal.refund,
		"price": u256_to_hex(deal.price),
		"value": u256_to_hex(deal.value),
	})))
}

/// Handles GET /api/auction/tx/{hash} requests: contribution status probe.
pub async fn get_tx_status(
	State(state): State<AppState>,
	Path(hash): Path<String>,
) -> Result<Json<Value>, ApiError> {
	let hash: B256 = hash
		.parse()
		.map_err(|_| ApiError::BadRequest(format!("Invalid transaction hash: {hash}")))?;

	let transaction = match state.connector.transaction(hash).await? {
		Some(transaction) if transaction.block_number.is_some() => transaction,
		// Not yet mined (or unknown to the node); the client polls again.
		_ => return Ok(Json(json!({ "status": "unknown" }))),
	};

	if transaction.to != Some(state.mirror.constants().contract_address) {
		return Ok(Json(json!({ "status": "invalid" })));
	}

	let outcome = match state.connector.receipt(hash).await? {
		Some(outcome) => outcome,
		None => return Ok(Json(json!({ "status": "unknown" }))),
	};

	match outcome.buyin() {
		Some(SaleEvent::Buyin {
			who,
			accounted,
			received,
			price,
		}) => Ok(Json(json!({
			"status": "success",
			"who": who,
			"accounted": u256_to_hex(*accounted),
			"received": u256_to_hex(*received),
			"price": u256_to_hex(*price),
		}))),
		// Mined without a Buyin log means the contract refused it.
		_ => Ok(Json(json!({ "status": "failed" }))),
	}
}
