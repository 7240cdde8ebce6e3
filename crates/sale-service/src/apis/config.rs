//! Static frontend configuration endpoint.

use crate::server::AppState;
use axum::extract::State;
use axum::response::Json;
use sale_types::u256_to_hex;
use serde_json::{json, Value};

/// Handles GET /api/config requests: values the frontend needs before it
/// can build transactions.
pub async fn get_config(State(state): State<AppState>) -> Json<Value> {
	let site = &state.config.site;

	Json(json!({
		"chainId": site.chain_id,
		"etherscan": site.etherscan,
		"gasPrice": u256_to_hex(state.config.sale.gas_price),
		"saleWebsite": site.sale_website,
	}))
}
