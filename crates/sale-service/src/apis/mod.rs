//! HTTP API handlers.

pub mod accounts;
pub mod auction;
pub mod config;
pub mod tx;

use alloy_primitives::Address;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use sale_connector::ConnectorError;
use sale_storage::StorageError;
use serde_json::json;
use thiserror::Error;

/// Errors an API handler can surface, mapped onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
	/// The request carried malformed input.
	#[error("{0}")]
	BadRequest(String),
	/// Error that occurred while talking to the node.
	#[error("Node error: {0}")]
	Node(#[from] ConnectorError),
	/// Error that occurred in the queue store.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	/// Everything else.
	#[error("Internal error: {0}")]
	Internal(String),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self {
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};
		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}

/// Parses a `0x`-prefixed address path parameter.
pub(crate) fn parse_address(raw: &str) -> Result<Address, ApiError> {
	raw.parse()
		.map_err(|_| ApiError::BadRequest(format!("Invalid address: {raw}")))
}
