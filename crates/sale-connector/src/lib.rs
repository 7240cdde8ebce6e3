//! Ethereum node facade for the sale backend.
//!
//! This module abstracts the node behind the [`SaleConnector`] trait:
//! balance and nonce queries, raw transaction submission, receipt
//! retrieval, block timestamps and typed sale-contract reads. Raw logs are
//! decoded into [`sale_types::SaleEvent`] variants here, at the boundary,
//! so domain logic never inspects ABI-level data.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use sale_types::{AuctionConstants, AuctionState, Deal, SaleLogEvent, TxOutcome};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::broadcast;

/// Re-export implementations
pub mod implementations {
	pub mod alloy;
	pub mod mock;
}

pub use implementations::alloy::AlloyConnector;
pub use implementations::mock::MockConnector;

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum ConnectorError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The bounded receipt wait elapsed without the transaction mining.
	#[error("Timed out waiting for receipt of {0}")]
	ReceiptTimeout(B256),
	/// Error that occurs while decoding chain data.
	#[error("Decode error: {0}")]
	Decode(String),
}

/// Minimal view of a transaction looked up by hash.
#[derive(Debug, Clone)]
pub struct TxInfo {
	/// Recipient, if the transaction is a call.
	pub to: Option<Address>,
	/// Block the transaction mined in, if mined.
	pub block_number: Option<u64>,
}

/// Trait defining the interface to the Ethereum node and sale contract.
///
/// Block delivery is an explicit broadcast channel rather than a callback:
/// numbers arrive in ascending order, at least once each, and a slow
/// subscriber that lags simply misses triggers (the next block re-triggers
/// the same work).
#[async_trait]
pub trait SaleConnector: Send + Sync {
	/// Current balance of an address in wei.
	async fn balance(&self, address: Address) -> Result<U256, ConnectorError>;

	/// Next valid nonce for an address.
	async fn next_nonce(&self, address: Address) -> Result<u64, ConnectorError>;

	/// Submits a raw signed transaction, returning its hash.
	async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ConnectorError>;

	/// Returns the transaction's outcome if it has mined, with its
	/// sale-contract logs decoded. `None` while still pending.
	async fn receipt(&self, hash: B256) -> Result<Option<TxOutcome>, ConnectorError>;

	/// Blocks until the transaction's outcome is available, up to the
	/// implementation's configured timeout.
	async fn wait_for_outcome(&self, hash: B256) -> Result<TxOutcome, ConnectorError>;

	/// Looks up a transaction by hash.
	async fn transaction(&self, hash: B256) -> Result<Option<TxInfo>, ConnectorError>;

	/// Latest block number.
	async fn block_number(&self) -> Result<u64, ConnectorError>;

	/// Resolves the timestamps of the given block numbers in one batch.
	async fn block_timestamps(
		&self,
		numbers: &[u64],
	) -> Result<HashMap<u64, u64>, ConnectorError>;

	/// Fetches and decodes `Buyin`/`Injected` logs in a block range.
	async fn fetch_sale_events(
		&self,
		from_block: u64,
		to_block: Option<u64>,
	) -> Result<Vec<SaleLogEvent>, ConnectorError>;

	/// Reads the immutable contract constants.
	async fn auction_constants(&self) -> Result<AuctionConstants, ConnectorError>;

	/// Reads the scalar auction state in one batch.
	async fn auction_state(&self) -> Result<AuctionState, ConnectorError>;

	/// Reads `buyins(address)`: accounted and received wei.
	async fn buyin_of(&self, address: Address) -> Result<(U256, U256), ConnectorError>;

	/// Quotes `theDeal(value)`.
	async fn the_deal(&self, value: U256) -> Result<Deal, ConnectorError>;

	/// Subscribes to new block numbers, in order.
	fn subscribe_blocks(&self) -> broadcast::Receiver<u64>;
}
